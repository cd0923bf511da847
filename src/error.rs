//! Error types for athena-relay.
//!
//! `RelayError` is the caller-facing error. Remote failures start life as an
//! [`EngineError`](crate::engine::EngineError) carrying the engine's error code
//! and are classified into transient or fatal by the execution layer.

use thiserror::Error;

use crate::engine::EngineError;

/// Main error type for athena-relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or malformed client configuration. Raised before any remote call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed query argument.
    #[error("Input error: {0}")]
    Input(String),

    /// A whitelisted, retryable engine error.
    #[error("Transient engine error: {0}")]
    TransientEngine(EngineError),

    /// Any other engine error during submission or polling.
    #[error("Engine error: {0}")]
    FatalEngine(EngineError),

    /// The engine reported the execution as FAILED. Holds the engine's reason verbatim.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A bounded transient-error budget ran out.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: EngineError },

    /// A bounded polling loop ran out before a terminal state was seen.
    #[error("Execution {execution_id} still running after {polls} polls")]
    PollLimitReached { execution_id: String, polls: u32 },

    /// The caller cancelled the operation while it was waiting.
    #[error("Operation cancelled")]
    Cancelled,

    /// Object store failures (missing object, bad location, transport).
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// The result payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unexpected failure surfaced by the orchestrator, original message preserved.
    #[error("Query execution error: {0}")]
    Execution(String),
}

impl RelayError {
    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an input error with the given message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates an object store error with the given message.
    pub fn object_store(msg: impl Into<String>) -> Self {
        Self::ObjectStore(msg.into())
    }

    /// Creates a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration Error",
            Self::Input(_) => "Input Error",
            Self::TransientEngine(_) => "Transient Engine Error",
            Self::FatalEngine(_) => "Engine Error",
            Self::QueryFailed(_) => "Query Failed",
            Self::RetriesExhausted { .. } => "Retries Exhausted",
            Self::PollLimitReached { .. } => "Poll Limit Reached",
            Self::Cancelled => "Cancelled",
            Self::ObjectStore(_) => "Object Store Error",
            Self::Decode(_) => "Decode Error",
            Self::Execution(_) => "Execution Error",
        }
    }

    /// Returns the engine's failure reason when the query itself failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::QueryFailed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Translates errors the orchestrator does not surface as-is.
    ///
    /// Boundary, engine, and lifecycle errors pass through untouched; anything
    /// else becomes `Execution` carrying the original message.
    pub(crate) fn into_surfaced(self) -> Self {
        match self {
            Self::ObjectStore(_) | Self::Decode(_) | Self::TransientEngine(_) => {
                Self::Execution(self.to_string())
            }
            other => other,
        }
    }
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;
