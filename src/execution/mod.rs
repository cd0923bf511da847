//! Statement submission and status polling.
//!
//! Both stages talk to the engine through the same transient-error retry
//! loop; every wait can be interrupted through a `CancellationToken`.

mod poller;
mod submitter;

pub use poller::{CompletedExecution, ExecutionStatus, Poller};
pub use submitter::Submitter;

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::{RetryPolicy, RetryState};
use crate::engine::EngineResult;
use crate::error::{RelayError, Result};

/// Sleeps for `delay` unless the token fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(RelayError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Runs one engine call, retrying whitelisted transient errors.
///
/// Non-transient errors surface as `FatalEngine` on the spot. With an
/// unbounded policy a transient error is retried until it clears.
pub(crate) async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut state = RetryState::new();

    loop {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        match call().await {
            Ok(value) => {
                if state.attempt() > 0 {
                    debug!("{} succeeded after {} retries", operation, state.attempt());
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() => match state.advance(policy) {
                Some(delay) => {
                    warn!(
                        "{} failed with {} (retry {}), retrying in {:?}",
                        operation,
                        error.code,
                        state.attempt(),
                        delay
                    );
                    sleep_or_cancel(delay, cancel).await?;
                }
                None => {
                    return Err(RelayError::RetriesExhausted {
                        attempts: state.attempt() + 1,
                        last: error,
                    });
                }
            },
            Err(error) => return Err(RelayError::FatalEngine(error)),
        }
    }
}
