//! Statement submission.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backoff::RetryPolicy;
use crate::engine::{ExecutionHandle, ExecutionRequest, QueryEngine};
use crate::error::Result;
use crate::execution::call_with_retry;

/// Sends start-query requests, retrying transient engine errors.
pub struct Submitter<'a> {
    engine: &'a dyn QueryEngine,
    transient: &'a RetryPolicy,
}

impl<'a> Submitter<'a> {
    pub fn new(engine: &'a dyn QueryEngine, transient: &'a RetryPolicy) -> Self {
        Self { engine, transient }
    }

    /// Submits the statement and returns its execution handle.
    ///
    /// Each call starts from a fresh retry state.
    pub async fn submit(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionHandle> {
        let id = call_with_retry(self.transient, cancel, "StartQueryExecution", || {
            self.engine.start_query_execution(request)
        })
        .await?;

        let handle = ExecutionHandle::new(id);
        info!("Submitted query execution {}", handle);
        Ok(handle)
    }
}
