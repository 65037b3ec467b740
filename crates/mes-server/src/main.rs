//! MES Server: Application entry point.

use std::process::ExitCode;

use mes_server::{ServerConfig, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.log_level, config.log_format) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    tracing::info!("Starting MES server...");

    match mes_server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "MES server failed");
            ExitCode::FAILURE
        }
    }
}
