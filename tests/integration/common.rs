//! Shared fixtures for the integration tests.

use athena_relay::engine::{ColumnInfo, MockQueryEngine, StatementKind};
use athena_relay::store::MemoryObjectStore;
use athena_relay::{QueryRelay, RelayConfig, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

pub use athena_relay::engine::MOCK_EXECUTION_ID as EXECUTION_ID;

/// Result artifact location for a DML statement.
pub const CSV_LOCATION: &str = "s3://query-results/relay/a1b2c3d4-5678-90ab-cdef-000000000001.csv";

/// Result artifact location for a UTILITY/DDL statement.
pub const TXT_LOCATION: &str = "s3://query-results/relay/a1b2c3d4-5678-90ab-cdef-000000000001.txt";

/// Pacing short enough that tests never wait noticeably.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::constant(Duration::from_millis(1))
}

/// Builds a relay over the given mocks with millisecond pacing.
pub fn relay(
    engine: &Arc<MockQueryEngine>,
    store: &Arc<MemoryObjectStore>,
    config: RelayConfig,
) -> QueryRelay {
    QueryRelay::new(engine.clone(), store.clone(), config)
        .unwrap()
        .with_poll_policy(fast_policy())
        .with_transient_policy(fast_policy())
}

/// An engine whose statement succeeds at once with the given kind.
pub fn succeeding_engine(kind: StatementKind, location: &str) -> MockQueryEngine {
    MockQueryEngine::new().with_statuses(vec![Ok(MockQueryEngine::succeeded(kind, location))])
}

/// An engine running a DML statement that produced the given columns.
pub fn dml_engine(columns: Vec<ColumnInfo>) -> MockQueryEngine {
    succeeding_engine(StatementKind::Dml, CSV_LOCATION).with_columns(columns)
}

pub fn store_with(uri: &str, body: &str) -> Arc<MemoryObjectStore> {
    Arc::new(
        MemoryObjectStore::new()
            .with_chunk_size(7)
            .with_object(uri, body)
            .unwrap(),
    )
}
