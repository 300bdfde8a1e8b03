//! Platform call failures.

use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy for outbound platform calls.
///
/// Nothing here is fatal to the process: callers log, abandon the current
/// event or command, and move on. Failed calls are never retried.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The referenced channel, member, or message does not exist.
    #[error("not found")]
    NotFound,

    /// The platform rejected the call for lack of permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Network fault, rate limit, or server-side error.
    #[error("transient platform failure: {0}")]
    Transient(String),

    /// The call did not complete within the request timeout.
    #[error("platform call timed out after {0:?}")]
    Timeout(Duration),
}
