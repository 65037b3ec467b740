//! Periodic removal of expired refresh tokens.

use std::time::Duration;

use mes_core::repository::RefreshTokenRepository;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Sweep expired refresh tokens every `interval` until `shutdown`
/// resolves. The first sweep runs immediately. A failed sweep is logged and
/// retried on the next tick.
pub async fn run_token_janitor<T, F>(tokens: T, interval: Duration, shutdown: F)
where
    T: RefreshTokenRepository,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("token janitor stopping");
                break;
            }
            _ = ticker.tick() => {
                match tokens.cleanup_expired().await {
                    Ok(0) => debug!("no expired refresh tokens"),
                    Ok(removed) => info!(removed, "expired refresh tokens removed"),
                    Err(e) => warn!(error = %e, "refresh token cleanup failed"),
                }
            }
        }
    }
}
