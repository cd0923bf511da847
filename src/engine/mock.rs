//! Scripted query engine for testing.
//!
//! Responses are queued up front; every call is counted so tests can assert
//! exactly how many remote round trips an operation made.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::engine::{
    ColumnInfo, EngineError, EngineResult, ExecutionHandle, ExecutionRequest,
    GetQueryResultsOutput, QueryEngine, QueryExecution, QueryExecutionStatus, QueryState,
    QueryStatistics, ResultConfiguration, ResultRow, ResultSet, ResultSetMetadata, StatementKind,
};

/// Execution id handed out when no start outcome is scripted.
pub const MOCK_EXECUTION_ID: &str = "a1b2c3d4-5678-90ab-cdef-000000000001";

/// A query engine that replays scripted responses.
#[derive(Debug, Default)]
pub struct MockQueryEngine {
    start_outcomes: Mutex<VecDeque<EngineResult<String>>>,
    statuses: Mutex<VecDeque<EngineResult<QueryExecution>>>,
    pages: Mutex<HashMap<Option<String>, GetQueryResultsOutput>>,
    submitted: Mutex<Vec<ExecutionRequest>>,
    result_calls: Mutex<Vec<(Option<u32>, Option<String>)>>,
    start_count: AtomicUsize,
    status_count: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockQueryEngine {
    /// Creates an engine that accepts every statement and reports it running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues outcomes for successive `start_query_execution` calls.
    pub fn with_start_outcomes(self, outcomes: Vec<EngineResult<String>>) -> Self {
        lock(&self.start_outcomes).extend(outcomes);
        self
    }

    /// Queues status responses. The last one repeats once the queue drains.
    pub fn with_statuses(self, statuses: Vec<EngineResult<QueryExecution>>) -> Self {
        lock(&self.statuses).extend(statuses);
        self
    }

    /// Registers the result page returned for `next_token`.
    pub fn with_page(self, next_token: Option<&str>, page: GetQueryResultsOutput) -> Self {
        lock(&self.pages).insert(next_token.map(String::from), page);
        self
    }

    /// Registers a first page holding only column metadata and a header row.
    pub fn with_columns(self, columns: Vec<ColumnInfo>) -> Self {
        let header = ResultRow::from_values(columns.iter().map(|c| c.name.clone()));
        let page = GetQueryResultsOutput {
            result_set: ResultSet {
                rows: vec![header],
                result_set_metadata: ResultSetMetadata {
                    column_info: columns,
                },
            },
            next_token: None,
        };
        self.with_page(None, page)
    }

    /// Number of `start_query_execution` calls made.
    pub fn start_calls(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    /// Number of `get_query_execution` calls made.
    pub fn status_calls(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }

    /// `(max_results, next_token)` of every `get_query_results` call.
    pub fn result_calls(&self) -> Vec<(Option<u32>, Option<String>)> {
        lock(&self.result_calls).clone()
    }

    /// Requests received by `start_query_execution`, in order.
    pub fn submitted(&self) -> Vec<ExecutionRequest> {
        lock(&self.submitted).clone()
    }

    /// A status in the given raw state.
    pub fn state(state: &str) -> QueryExecution {
        QueryExecution {
            status: QueryExecutionStatus {
                state: Some(QueryState::from(state.to_string())),
                state_change_reason: None,
            },
            ..Default::default()
        }
    }

    /// A RUNNING status.
    pub fn running() -> QueryExecution {
        Self::state("RUNNING")
    }

    /// A FAILED status with the given reason.
    pub fn failed(reason: &str) -> QueryExecution {
        let mut execution = Self::state("FAILED");
        execution.status.state_change_reason = Some(reason.to_string());
        execution
    }

    /// A SUCCEEDED status for the given statement kind and output location.
    pub fn succeeded(kind: StatementKind, output_location: &str) -> QueryExecution {
        QueryExecution {
            statement_type: Some(kind),
            result_configuration: ResultConfiguration {
                output_location: Some(output_location.to_string()),
                encryption_configuration: None,
            },
            ..Self::state("SUCCEEDED")
        }
    }

    /// A SUCCEEDED status carrying statistics.
    pub fn succeeded_with_statistics(
        kind: StatementKind,
        output_location: &str,
        statistics: QueryStatistics,
    ) -> QueryExecution {
        QueryExecution {
            statistics,
            ..Self::succeeded(kind, output_location)
        }
    }
}

#[async_trait]
impl QueryEngine for MockQueryEngine {
    async fn start_query_execution(&self, request: &ExecutionRequest) -> EngineResult<String> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.submitted).push(request.clone());
        lock(&self.start_outcomes)
            .pop_front()
            .unwrap_or_else(|| Ok(MOCK_EXECUTION_ID.to_string()))
    }

    async fn get_query_execution(&self, handle: &ExecutionHandle) -> EngineResult<QueryExecution> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        let mut statuses = lock(&self.statuses);
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        let mut execution = next.unwrap_or_else(|| Ok(Self::running()))?;
        execution
            .query_execution_id
            .get_or_insert_with(|| handle.as_str().to_string());
        Ok(execution)
    }

    async fn get_query_results(
        &self,
        _handle: &ExecutionHandle,
        max_results: Option<u32>,
        next_token: Option<&str>,
    ) -> EngineResult<GetQueryResultsOutput> {
        lock(&self.result_calls).push((max_results, next_token.map(String::from)));

        let pages = lock(&self.pages);
        let mut page = pages
            .get(&next_token.map(String::from))
            .cloned()
            .ok_or_else(|| {
                EngineError::new(
                    "InvalidRequestException",
                    format!("Unknown pagination token: {:?}", next_token),
                )
            })?;
        if let Some(max) = max_results {
            page.result_set.rows.truncate(max as usize);
        }
        Ok(page)
    }
}
