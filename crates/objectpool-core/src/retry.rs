use std::time::Duration;

use tracing::warn;

use crate::error::{Categorizable, ErrorCategory, Result};

/// Fixed back-off between retries of a transient store call.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(1500);

/// Runs `op` until it returns `Ok` or a [`PoolError`] whose
/// [`ErrorCategory`] is [`ErrorCategory::Definite`]. Transient errors are
/// logged and retried forever with [`RETRY_BACKOFF`] - this is what makes
/// `release`/`requeue`/`extend` "block indefinitely under store outage, but
/// never return a misleading result".
///
/// Callers that need to give up must drop the future; there is no
/// cancellation token here by design.
pub async fn retry_forever<T, F, Fut>(op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.category() == ErrorCategory::Transient => {
                warn!(op = op_name, error = %err, "transient store error, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err),
        }
    }
}
