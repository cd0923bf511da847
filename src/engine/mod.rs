//! Query engine abstraction.
//!
//! The remote engine is reached through the `QueryEngine` trait so the
//! execution layer can run against the HTTP client or a scripted mock.

mod http;
mod mock;
mod types;

pub use http::{HttpQueryEngine, HttpQueryEngineConfig};
pub use mock::{MockQueryEngine, MOCK_EXECUTION_ID};
pub use types::{
    ColumnInfo, Datum, EncryptionConfiguration, ExecutionHandle, ExecutionRequest,
    GetQueryExecutionOutput, GetQueryResultsInput, GetQueryResultsOutput, QueryExecution,
    QueryExecutionContext, QueryExecutionStatus, QueryState, QueryStatistics,
    ResultConfiguration, ResultRow, ResultSet, ResultSetMetadata, StartQueryExecutionOutput,
    StatementKind,
};

use async_trait::async_trait;
use thiserror::Error;

/// Error codes retried with backoff. Everything else is fatal.
pub const TRANSIENT_ERROR_CODES: [&str; 4] = [
    "TooManyRequestsException",
    "ThrottlingException",
    "NetworkingError",
    "UnknownEndpoint",
];

/// An error reported by (or on the way to) the remote engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct EngineError {
    /// Engine error code, e.g. `ThrottlingException`.
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transport-level failure before the engine answered.
    pub fn networking(message: impl Into<String>) -> Self {
        Self::new("NetworkingError", message)
    }

    /// Returns true when the code is on the transient whitelist.
    pub fn is_transient(&self) -> bool {
        TRANSIENT_ERROR_CODES.contains(&self.code.as_str())
    }
}

/// Result type for raw engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Trait defining the remote query engine operations.
///
/// Implementations must be safe to share between concurrent invocations.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Submits a statement and returns the engine-assigned execution id.
    async fn start_query_execution(&self, request: &ExecutionRequest) -> EngineResult<String>;

    /// Returns the current status of an execution.
    async fn get_query_execution(&self, handle: &ExecutionHandle) -> EngineResult<QueryExecution>;

    /// Fetches one page of results.
    async fn get_query_results(
        &self,
        handle: &ExecutionHandle,
        max_results: Option<u32>,
        next_token: Option<&str>,
    ) -> EngineResult<GetQueryResultsOutput>;
}
