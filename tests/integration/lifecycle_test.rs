//! Statement lifecycle integration tests.
//!
//! Submission, resume, polling, failure propagation and cancellation as seen
//! through `QueryRelay`.

use athena_relay::engine::{ColumnInfo, EngineError, MockQueryEngine, StatementKind};
use athena_relay::store::MemoryObjectStore;
use athena_relay::{
    ExecutionHandle, QueryInput, QueryRequest, RelayConfig, RelayError, RetryPolicy,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::common::{
    dml_engine, fast_policy, relay, store_with, succeeding_engine, CSV_LOCATION, EXECUTION_ID,
    TXT_LOCATION,
};

#[tokio::test]
async fn test_submission_carries_configuration() {
    let engine = Arc::new(succeeding_engine(StatementKind::Ddl, TXT_LOCATION));
    let store = store_with(TXT_LOCATION, "");
    let config = RelayConfig {
        database: "sales".to_string(),
        workgroup: "analytics".to_string(),
        catalog: Some("AwsDataCatalog".to_string()),
        output_location: Some("s3://query-results/relay/".to_string()),
        ..Default::default()
    };
    let relay = relay(&engine, &store, config);

    relay.query("CREATE DATABASE IF NOT EXISTS staging").await.unwrap();

    let submitted = engine.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        serde_json::to_value(&submitted[0]).unwrap(),
        json!({
            "QueryString": "CREATE DATABASE IF NOT EXISTS staging",
            "QueryExecutionContext": {"Database": "sales", "Catalog": "AwsDataCatalog"},
            "ResultConfiguration": {"OutputLocation": "s3://query-results/relay/"},
            "WorkGroup": "analytics"
        })
    );
}

#[tokio::test]
async fn test_resume_never_resubmits() {
    let engine = Arc::new(succeeding_engine(StatementKind::Utility, TXT_LOCATION));
    let store = store_with(TXT_LOCATION, "default\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query(EXECUTION_ID).await.unwrap();

    assert_eq!(engine.start_calls(), 0);
    assert_eq!(engine.status_calls(), 1);
    assert_eq!(envelope.query_execution_id, EXECUTION_ID);
    assert_eq!(envelope.items().len(), 1);

    let explicit = relay
        .query(QueryInput::Resume(ExecutionHandle::new("my-execution")))
        .await
        .unwrap();
    assert_eq!(explicit.query_execution_id, "my-execution");
    assert_eq!(engine.start_calls(), 0);
}

#[tokio::test]
async fn test_transient_submission_error_then_success() {
    let engine = Arc::new(
        succeeding_engine(StatementKind::Utility, TXT_LOCATION).with_start_outcomes(vec![
            Err(EngineError::new("TooManyRequestsException", "Slow down")),
            Ok(EXECUTION_ID.to_string()),
            Err(EngineError::new("ThrottlingException", "Rate exceeded")),
            Ok(EXECUTION_ID.to_string()),
        ]),
    );
    let store = store_with(TXT_LOCATION, "ok\n");
    let relay = relay(&engine, &store, RelayConfig::default())
        .with_transient_policy(fast_policy().with_max_attempts(1));

    relay.query("SHOW DATABASES").await.unwrap();
    assert_eq!(engine.start_calls(), 2);

    // A fresh lifecycle gets a fresh retry budget.
    relay.query("SHOW DATABASES").await.unwrap();
    assert_eq!(engine.start_calls(), 4);
}

#[tokio::test]
async fn test_bounded_transient_budget() {
    let engine = Arc::new(MockQueryEngine::new().with_start_outcomes(vec![
        Err(EngineError::networking("connection reset")),
        Err(EngineError::networking("connection reset")),
        Err(EngineError::networking("connection reset")),
    ]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default())
        .with_transient_policy(fast_policy().with_max_attempts(2));

    let err = relay.query("SELECT 1").await.unwrap_err();

    assert!(
        matches!(err, RelayError::RetriesExhausted { attempts: 3, .. }),
        "got {:?}",
        err
    );
    assert_eq!(engine.start_calls(), 3);
    assert_eq!(engine.status_calls(), 0);
}

#[tokio::test]
async fn test_fatal_submission_error() {
    let engine = Arc::new(MockQueryEngine::new().with_start_outcomes(vec![Err(
        EngineError::new("InvalidRequestException", "line 1:8: mismatched input"),
    )]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default());

    let err = relay.query("SELEC 1").await.unwrap_err();

    match err {
        RelayError::FatalEngine(engine_error) => {
            assert_eq!(engine_error.code, "InvalidRequestException");
            assert_eq!(engine_error.message, "line 1:8: mismatched input");
        }
        other => panic!("Expected FatalEngine, got {:?}", other),
    }
    assert_eq!(engine.start_calls(), 1);
}

#[tokio::test]
async fn test_failed_query_reports_reason() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![
        Ok(MockQueryEngine::failed("Forced Error")),
        Ok(MockQueryEngine::running()),
    ]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default());

    let err = relay.query("SELECT * FROM broken").await.unwrap_err();

    assert_eq!(err.failure_reason(), Some("Forced Error"));
    assert_eq!(err.to_string(), "Query failed: Forced Error");
    assert_eq!(engine.status_calls(), 1, "no polls after FAILED");
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn test_unknown_states_polled_until_success() {
    let engine = Arc::new(
        MockQueryEngine::new()
            .with_statuses(vec![
                Ok(MockQueryEngine::state("QUEUED")),
                Ok(MockQueryEngine::running()),
                Ok(MockQueryEngine::state("CANCELLED")),
                Ok(MockQueryEngine::state("SOMETHING_NEW")),
                Ok(MockQueryEngine::succeeded(StatementKind::Utility, TXT_LOCATION)),
            ]),
    );
    let store = store_with(TXT_LOCATION, "x\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    relay.query("SHOW TABLES").await.unwrap();

    assert_eq!(engine.status_calls(), 5);
}

#[tokio::test]
async fn test_caller_supplied_poll_delay() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![
        Ok(MockQueryEngine::running()),
        Ok(MockQueryEngine::running()),
        Ok(MockQueryEngine::running()),
        Ok(MockQueryEngine::succeeded(StatementKind::Utility, TXT_LOCATION)),
    ]));
    let store = store_with(TXT_LOCATION, "x\n");
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let seen = attempts.clone();
    let relay = relay(&engine, &store, RelayConfig::default()).with_poll_policy(
        RetryPolicy::from_fn(move |attempt| {
            seen.lock().unwrap().push(attempt);
            Duration::from_millis(u64::from(attempt))
        }),
    );

    relay.query("SHOW TABLES").await.unwrap();

    assert_eq!(*attempts.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_transient_polling_errors_are_retried() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![
        Err(EngineError::new("UnknownEndpoint", "could not resolve host")),
        Ok(MockQueryEngine::running()),
        Err(EngineError::new("ThrottlingException", "Rate exceeded")),
        Ok(MockQueryEngine::succeeded(StatementKind::Utility, TXT_LOCATION)),
    ]));
    let store = store_with(TXT_LOCATION, "x\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query("SHOW TABLES").await.unwrap();

    assert_eq!(envelope.items().len(), 1);
    assert_eq!(engine.status_calls(), 4);
}

#[tokio::test]
async fn test_poll_limit() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![Ok(MockQueryEngine::running())]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default())
        .with_poll_policy(fast_policy().with_max_attempts(4));

    let err = relay.query("SELECT sleep(3600)").await.unwrap_err();

    assert!(
        matches!(err, RelayError::PollLimitReached { polls: 5, .. }),
        "got {:?}",
        err
    );
    assert_eq!(engine.status_calls(), 5);
}

#[tokio::test]
async fn test_max_polls_from_config() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![Ok(MockQueryEngine::running())]));
    let store = Arc::new(MemoryObjectStore::new());
    let config = RelayConfig {
        retry_ms: 1,
        max_polls: Some(2),
        ..Default::default()
    };
    let relay = athena_relay::QueryRelay::new(engine.clone(), store, config).unwrap();

    let err = relay.query("SELECT 1").await.unwrap_err();

    assert_eq!(err.category(), "Poll Limit Reached");
    assert_eq!(engine.status_calls(), 3);
}

#[tokio::test]
async fn test_no_wait_returns_execution_id() {
    let engine = Arc::new(MockQueryEngine::new());
    let store = Arc::new(MemoryObjectStore::new());
    let config = RelayConfig {
        wait_for_results: false,
        get_stats: true,
        ..Default::default()
    };
    let relay = relay(&engine, &store, config);

    let envelope = relay.query("INSERT INTO t SELECT * FROM s").await.unwrap();

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"QueryExecutionId": EXECUTION_ID})
    );
    assert_eq!(engine.start_calls(), 1);
    assert_eq!(engine.status_calls(), 0);
}

#[tokio::test]
async fn test_skip_results() {
    let engine = Arc::new(dml_engine(vec![ColumnInfo::new("a", "varchar")]));
    let store = store_with(CSV_LOCATION, "\"a\"\n\"1\"\n");
    let config = RelayConfig {
        skip_results: true,
        ..Default::default()
    };
    let relay = relay(&engine, &store, config);

    let envelope = relay.query("SELECT a FROM t").await.unwrap();

    assert_eq!(envelope.items, None);
    assert_eq!(envelope.query_execution_id, EXECUTION_ID);
    assert_eq!(store.reads(), 0);
    assert!(engine.result_calls().is_empty());
}

#[tokio::test]
async fn test_input_errors_before_remote_calls() {
    let engine = Arc::new(MockQueryEngine::new());
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default());

    let err = relay.query("").await.unwrap_err();
    assert!(matches!(err, RelayError::Input(_)));

    let err = relay
        .query(QueryRequest::sql("SELECT 1").with_page_size(5000))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Configuration(_)));

    assert_eq!(engine.start_calls(), 0);
    assert_eq!(engine.status_calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_polling() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses(vec![Ok(MockQueryEngine::running())]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default())
        .with_poll_policy(athena_relay::RetryPolicy::constant(Duration::from_secs(3600)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = relay
        .query_with_cancel("SELECT * FROM huge", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Cancelled));
    assert_eq!(engine.status_calls(), 1);
}

#[tokio::test]
async fn test_relay_shared_across_tasks() {
    let engine = Arc::new(succeeding_engine(StatementKind::Utility, TXT_LOCATION));
    let store = store_with(TXT_LOCATION, "a\nb\n");
    let relay = Arc::new(relay(&engine, &store, RelayConfig::default()));

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let relay = relay.clone();
            tokio::spawn(async move { relay.query(format!("SHOW TABLES IN db{i}")).await })
        })
        .collect();

    for task in tasks {
        let envelope = task.await.unwrap().unwrap();
        assert_eq!(envelope.items().len(), 2);
    }
    assert_eq!(engine.start_calls(), 4);
}
