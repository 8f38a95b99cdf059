//! Errors returned by capability clients.

use std::time::Duration;
use thiserror::Error;

/// Failure of a capability call.
///
/// Every variant is retryable from the caller's point of view: plugins log
/// and move on, the controller re-queues with backoff, the cache syncer waits
/// for the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, rate limit or 5xx.
    #[error("transient error: {0}")]
    Transient(String),

    /// Any other API failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The call did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(e: serde_yaml::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

/// Runs `fut` under `deadline`, mapping expiry to [`ClientError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = Result<T, ClientError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| ClientError::Timeout(deadline))?
}
