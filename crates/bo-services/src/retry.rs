//! Retry logic with exponential backoff for read-only routine calls.
//!
//! Retries only on transport failures (pool exhaustion, dropped
//! connections, timeouts). Business errors, invalid calls and rows that fail
//! to decode are returned immediately. Writes never go through here.

use std::future::Future;
use std::time::Duration;

use bo_core::{DomainError, DriverError};

/// Maximum number of retry attempts after the initial call.
const MAX_RETRIES: u32 = 2;

/// Base delay between retries (doubles each attempt: 100ms, 200ms).
const BASE_DELAY_MS: u64 = 100;

/// Run a read with exponential backoff retry on connectivity errors.
///
/// The closure `f` is called up to `MAX_RETRIES + 1` times.
pub(crate) async fn retry_read<T, F, Fut>(f: F) -> Result<T, DomainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    routine = %e.routine_label(),
                    "read failed, retrying in {delay:?}: {}",
                    e.message
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    // Final attempt, no more retries.
    f().await
}

/// Connectivity failures raised by the transport itself. Decode and protocol
/// failures are classified as connectivity too but repeat on every attempt.
fn is_transient(err: &DomainError) -> bool {
    err.is_connectivity() && matches!(err.cause, Some(DriverError::Connection { .. }))
}
