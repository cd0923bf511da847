//! athena-relay - client-side orchestration over an Athena-style query engine.
//!
//! Submits SQL, polls the execution with backoff and transient-error
//! recovery, reads the result artifact from object storage and decodes it
//! into typed records.

pub mod backoff;
pub mod config;
pub mod decode;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod input;
pub mod logging;
pub mod relay;
pub mod store;

pub use backoff::{DelayStrategy, RetryPolicy, RetryState};
pub use config::RelayConfig;
pub use decode::{ColumnManifest, Item, Record, Value};
pub use engine::{ExecutionHandle, QueryEngine};
pub use envelope::{ExecutionStatistics, ResultEnvelope};
pub use error::{RelayError, Result};
pub use input::{QueryInput, QueryRequest};
pub use relay::QueryRelay;
pub use store::{ObjectLocation, ObjectStore};
