//! Logging and tracing initialization.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;
use crate::error::{ServerError, ServerResult};

/// Build the filter: `RUST_LOG` wins, otherwise `level` with the database
/// driver quietened.
pub fn build_filter(level: &str) -> ServerResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(format!("{level},surrealdb=warn,surrealdb_core=warn"))
            .map_err(|e| ServerError::config(format!("invalid log level {level:?}: {e}"))),
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(level: &str, format: LogFormat) -> ServerResult<()> {
    let filter = build_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            registry
                .with(fmt::layer().with_target(true).with_ansi(is_terminal))
                .try_init()
        }
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_ansi(false))
            .try_init(),
    };

    result.map_err(|e| ServerError::init(format!("logging: {e}")))
}
