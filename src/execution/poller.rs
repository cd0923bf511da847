//! Execution status polling.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::{RetryPolicy, RetryState};
use crate::decode::ColumnManifest;
use crate::engine::{ExecutionHandle, QueryEngine, QueryExecution, QueryState};
use crate::error::{RelayError, Result};
use crate::execution::{call_with_retry, sleep_or_cancel};

/// Coarse lifecycle state of an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Anything that is neither SUCCEEDED nor FAILED, including QUEUED,
    /// CANCELLED and states this client has never heard of.
    Running,
    Succeeded,
    Failed(String),
}

impl ExecutionStatus {
    pub fn of(execution: &QueryExecution) -> Self {
        match &execution.status.state {
            Some(QueryState::Succeeded) => Self::Succeeded,
            Some(QueryState::Failed) => Self::Failed(
                execution
                    .status
                    .state_change_reason
                    .clone()
                    .unwrap_or_default(),
            ),
            _ => Self::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A finished execution together with what was learned while waiting for it.
#[derive(Debug, Clone)]
pub struct CompletedExecution {
    pub handle: ExecutionHandle,
    pub execution: QueryExecution,
    /// Column metadata, present only for DML when a manifest was requested.
    pub manifest: Option<ColumnManifest>,
    /// Status responses that were not terminal.
    pub pending_polls: u32,
}

/// Polls an execution until it reaches a terminal state.
pub struct Poller<'a> {
    engine: &'a dyn QueryEngine,
    interval: &'a RetryPolicy,
    transient: &'a RetryPolicy,
    fetch_manifest: bool,
}

impl<'a> Poller<'a> {
    /// `interval` paces re-polls of a running execution and its attempt
    /// budget bounds how many are made. `transient` governs retries of
    /// failed status calls.
    pub fn new(
        engine: &'a dyn QueryEngine,
        interval: &'a RetryPolicy,
        transient: &'a RetryPolicy,
    ) -> Self {
        Self {
            engine,
            interval,
            transient,
            fetch_manifest: false,
        }
    }

    /// Fetch the column manifest once the execution succeeds.
    pub fn with_manifest(mut self, fetch_manifest: bool) -> Self {
        self.fetch_manifest = fetch_manifest;
        self
    }

    pub async fn wait(
        &self,
        handle: &ExecutionHandle,
        cancel: &CancellationToken,
    ) -> Result<CompletedExecution> {
        let mut pacing = RetryState::new();
        let mut pending_polls = 0u32;

        loop {
            let execution = call_with_retry(self.transient, cancel, "GetQueryExecution", || {
                self.engine.get_query_execution(handle)
            })
            .await?;

            match ExecutionStatus::of(&execution) {
                ExecutionStatus::Succeeded => {
                    info!(
                        "Execution {} succeeded after {} pending polls",
                        handle, pending_polls
                    );
                    let manifest = if self.wants_manifest(&execution) {
                        Some(self.fetch_manifest(handle, cancel).await?)
                    } else {
                        None
                    };
                    return Ok(CompletedExecution {
                        handle: handle.clone(),
                        execution,
                        manifest,
                        pending_polls,
                    });
                }
                ExecutionStatus::Failed(reason) => {
                    info!("Execution {} failed: {}", handle, reason);
                    return Err(RelayError::QueryFailed(reason));
                }
                ExecutionStatus::Running => {
                    pending_polls += 1;
                    let Some(delay) = pacing.advance(self.interval) else {
                        return Err(RelayError::PollLimitReached {
                            execution_id: handle.to_string(),
                            polls: pending_polls,
                        });
                    };
                    debug!(
                        "Execution {} is {}, polling again in {:?}",
                        handle,
                        execution
                            .status
                            .state
                            .as_ref()
                            .map(QueryState::as_str)
                            .unwrap_or("UNKNOWN"),
                        delay
                    );
                    sleep_or_cancel(delay, cancel).await?;
                }
            }
        }
    }

    fn wants_manifest(&self, execution: &QueryExecution) -> bool {
        self.fetch_manifest
            && execution
                .statement_type
                .as_ref()
                .map_or(true, |kind| !kind.is_listing())
    }

    async fn fetch_manifest(
        &self,
        handle: &ExecutionHandle,
        cancel: &CancellationToken,
    ) -> Result<ColumnManifest> {
        let output = call_with_retry(self.transient, cancel, "GetQueryResults", || {
            self.engine.get_query_results(handle, Some(1), None)
        })
        .await?;
        let manifest = ColumnManifest::new(output.result_set.result_set_metadata.column_info);
        debug!("Fetched manifest with {} columns for {}", manifest.len(), handle);
        Ok(manifest)
    }
}
