//! Connect with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::connection::Connection;
use crate::error::{ClientError, ClientResult};

/// First retry delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Retry delays stop doubling here.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Anything that can be asked to connect.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, cancel: &CancellationToken) -> ClientResult<()>;
}

#[async_trait]
impl Connect for Connection {
    async fn connect(&self, cancel: &CancellationToken) -> ClientResult<()> {
        Connection::connect(self, cancel).await
    }
}

/// Keep calling `connect` until it succeeds.
///
/// Waits 1s after the first retryable failure and doubles the wait after
/// each further one. Fatal errors and cancellation are returned at once.
pub async fn ensure_connection<C>(cancel: &CancellationToken, conn: Option<&C>) -> ClientResult<()>
where
    C: Connect + ?Sized,
{
    let conn = conn.ok_or(ClientError::NoConnection)?;
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt: u32 = 1;

    loop {
        let err = match conn.connect(cancel).await {
            Ok(()) => {
                if attempt > 1 {
                    info!(attempt, "connection established");
                }
                return Ok(());
            }
            Err(e) => e,
        };

        if matches!(err, ClientError::Cancelled) || err.is_fatal() {
            return Err(err);
        }

        warn!(
            attempt,
            error = %err,
            code = err.error_code(),
            retry_in_ms = backoff.as_millis() as u64,
            "connect failed, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
        }

        backoff = (backoff * 2).min(MAX_BACKOFF);
        attempt += 1;
    }
}
