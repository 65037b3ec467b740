//! Reporting of cleanup failures that the auth flow swallows.

use std::fmt;

use tracing::warn;

/// Best-effort steps whose failure does not fail the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// Deleting a refresh token found to be expired.
    DeleteExpiredRefreshToken,
    /// Deleting a refresh token whose owning user no longer exists.
    DeleteOrphanedRefreshToken,
    /// Re-creating a consumed refresh token after its replacement could
    /// not be persisted.
    RestoreRefreshToken,
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeleteExpiredRefreshToken => "delete_expired_refresh_token",
            Self::DeleteOrphanedRefreshToken => "delete_orphaned_refresh_token",
            Self::RestoreRefreshToken => "restore_refresh_token",
        })
    }
}

/// Receives every cleanup or compensation error the auth flow does not
/// propagate.
pub trait AuthObserver: Send + Sync + 'static {
    fn cleanup_failed(&self, action: CleanupAction, error: &dyn std::error::Error);
}

/// Default observer: a `warn!` event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AuthObserver for TracingObserver {
    fn cleanup_failed(&self, action: CleanupAction, error: &dyn std::error::Error) {
        warn!(%action, error = %error, "auth cleanup failed");
    }
}
