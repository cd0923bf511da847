//! Result materialization integration tests.
//!
//! Covers listing and CSV decoding, raw passthrough and typed coercion of
//! result artifacts read from the object store.

use athena_relay::engine::{ColumnInfo, MockQueryEngine, StatementKind};
use athena_relay::store::MemoryObjectStore;
use athena_relay::{Item, Record, RelayConfig, RelayError, Value};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

use super::common::{
    dml_engine, relay, store_with, succeeding_engine, CSV_LOCATION, EXECUTION_ID, TXT_LOCATION,
};

fn record(pairs: &[(&str, Value)]) -> Item {
    Item::Record(pairs.iter().cloned().collect::<Record>())
}

#[tokio::test]
async fn test_show_tables_listing() {
    let engine = Arc::new(succeeding_engine(StatementKind::Utility, TXT_LOCATION));
    let store = store_with(TXT_LOCATION, "events\npage_views\n\nsessions\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query("SHOW TABLES").await.unwrap();

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "Items": [{"row": "events"}, {"row": "page_views"}, {"row": "sessions"}],
            "QueryExecutionId": EXECUTION_ID
        })
    );
    assert!(engine.result_calls().is_empty(), "listing must not fetch a manifest");
}

#[tokio::test]
async fn test_describe_key_value_listing() {
    let engine = Arc::new(succeeding_engine(StatementKind::Ddl, TXT_LOCATION));
    let store = store_with(
        TXT_LOCATION,
        "id                  \tbigint              \t\nname                \tstring              \t\n",
    );
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query("DESCRIBE events").await.unwrap();

    assert_eq!(
        envelope.items(),
        &[
            record(&[("id", Value::from("bigint"))]),
            record(&[("name", Value::from("string"))]),
        ]
    );
    assert!(engine.result_calls().is_empty());
}

#[tokio::test]
async fn test_csv_yearmonth_as_integer() {
    let engine = Arc::new(dml_engine(vec![ColumnInfo::new("yearmonth_field", "integer")]));
    let store = store_with(CSV_LOCATION, "\"yearmonth_field\"\n\"201712\"\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay
        .query("SELECT yearmonth_field FROM events LIMIT 1")
        .await
        .unwrap();

    assert_eq!(
        envelope.items(),
        &[record(&[("yearmonth_field", Value::Int(201712))])]
    );
    assert_eq!(engine.result_calls(), vec![(Some(1), None)]);
}

#[tokio::test]
async fn test_csv_typed_columns() {
    let engine = Arc::new(dml_engine(vec![
        ColumnInfo::new("id", "bigint"),
        ColumnInfo::new("score", "double"),
        ColumnInfo::new("active", "boolean"),
        ColumnInfo::new("label", "varchar"),
        ColumnInfo::new("ratio", "integer"),
    ]));
    let body = concat!(
        "\"id\",\"score\",\"active\",\"label\",\"ratio\"\n",
        "\"1\",\"2.5\",\"true\",\"first, quoted\",\"1.5\"\n",
        "\"2\",\"NaN-ish\",\"FALSE\",\"second\",\"3\"\n",
    );
    let store = store_with(CSV_LOCATION, body);
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query("SELECT * FROM scores").await.unwrap();

    assert_eq!(
        envelope.items(),
        &[
            record(&[
                ("id", Value::Int(1)),
                ("score", Value::Float(2.5)),
                ("active", Value::Bool(true)),
                ("label", Value::from("first, quoted")),
                ("ratio", Value::Float(1.5)),
            ]),
            record(&[
                ("id", Value::Int(2)),
                ("score", Value::from("NaN-ish")),
                ("active", Value::Bool(false)),
                ("label", Value::from("second")),
                ("ratio", Value::Int(3)),
            ]),
        ]
    );
}

#[tokio::test]
async fn test_empty_cells_omitted_by_default() {
    let columns = vec![ColumnInfo::new("a", "integer"), ColumnInfo::new("b", "varchar")];
    let body = "\"a\",\"b\"\n\"\",\"x\"\n";

    let engine = Arc::new(dml_engine(columns.clone()));
    let relay_default = relay(&engine, &store_with(CSV_LOCATION, body), RelayConfig::default());
    let envelope = relay_default.query("SELECT a, b FROM t").await.unwrap();
    assert_eq!(envelope.items(), &[record(&[("b", Value::from("x"))])]);

    let engine = Arc::new(dml_engine(columns));
    let keep_empty = RelayConfig {
        ignore_empty: false,
        ..Default::default()
    };
    let relay_keep = relay(&engine, &store_with(CSV_LOCATION, body), keep_empty);
    let envelope = relay_keep.query("SELECT a, b FROM t").await.unwrap();
    assert_eq!(
        serde_json::to_value(envelope.items()).unwrap(),
        json!([{"a": null, "b": "x"}])
    );
}

#[tokio::test]
async fn test_raw_passthrough() {
    let engine = Arc::new(succeeding_engine(StatementKind::Dml, CSV_LOCATION));
    let store = store_with(CSV_LOCATION, "\"id\",\"name\"\n \"1\",\"alice\" \n");
    let config = RelayConfig {
        format_json: false,
        ..Default::default()
    };
    let relay = relay(&engine, &store, config);

    let envelope = relay.query("SELECT id, name FROM users").await.unwrap();

    assert_eq!(
        envelope.items(),
        &[
            Item::Raw("\"id\",\"name\"".to_string()),
            Item::Raw("\"1\",\"alice\"".to_string()),
        ]
    );
    assert!(engine.result_calls().is_empty(), "raw mode needs no manifest");
}

#[tokio::test]
async fn test_utc_dates() {
    let columns = vec![
        ColumnInfo::new("day", "date"),
        ColumnInfo::new("seen_at", "timestamp with time zone"),
        ColumnInfo::new("local", "timestamp with time zone"),
        ColumnInfo::new("clock", "time"),
    ];
    let body = concat!(
        "\"day\",\"seen_at\",\"local\",\"clock\"\n",
        "\"2012-12-30\",\"2021-07-19 16:01:35.000 America/Los_Angeles\",\"2021-07-19 16:01:35.000\",\"15:56:22.008\"\n",
    );

    let engine = Arc::new(dml_engine(columns.clone()));
    let config = RelayConfig {
        utc_dates: true,
        ..Default::default()
    };
    let relay_utc = relay(&engine, &store_with(CSV_LOCATION, body), config);
    let envelope = relay_utc.query("SELECT * FROM visits").await.unwrap();

    assert_eq!(
        envelope.items(),
        &[record(&[
            (
                "day",
                Value::Timestamp(Utc.with_ymd_and_hms(2012, 12, 30, 0, 0, 0).unwrap())
            ),
            (
                "seen_at",
                Value::Timestamp(Utc.with_ymd_and_hms(2021, 7, 19, 23, 1, 35).unwrap())
            ),
            ("local", Value::from("2021-07-19 16:01:35.000")),
            ("clock", Value::from("15:56:22.008")),
        ])]
    );
    assert_eq!(
        serde_json::to_value(envelope.items()).unwrap()[0]["seen_at"],
        json!("2021-07-19T23:01:35.000Z")
    );

    // Off by default: temporal columns stay text.
    let engine = Arc::new(dml_engine(columns));
    let relay_plain = relay(&engine, &store_with(CSV_LOCATION, body), RelayConfig::default());
    let envelope = relay_plain.query("SELECT * FROM visits").await.unwrap();
    assert_eq!(
        envelope.items()[0].as_record().unwrap().get("day"),
        Some(&Value::from("2012-12-30"))
    );
}

#[tokio::test]
async fn test_suffix_mismatch_yields_no_items() {
    let location = "s3://query-results/relay/a1b2c3d4.txt";
    let engine = Arc::new(
        MockQueryEngine::new()
            .with_statuses(vec![Ok(MockQueryEngine::succeeded(StatementKind::Dml, location))])
            .with_columns(vec![ColumnInfo::new("a", "varchar")]),
    );
    let store = store_with(location, "\"a\"\n\"1\"\n");
    let relay = relay(&engine, &store, RelayConfig::default());

    let envelope = relay.query("SELECT a FROM t").await.unwrap();

    assert!(envelope.items.as_ref().unwrap().is_empty());
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn test_missing_artifact_is_wrapped() {
    let engine = Arc::new(dml_engine(vec![ColumnInfo::new("a", "varchar")]));
    let store = Arc::new(MemoryObjectStore::new());
    let relay = relay(&engine, &store, RelayConfig::default());

    let err = relay.query("SELECT a FROM t").await.unwrap_err();

    match err {
        RelayError::Execution(message) => {
            assert!(message.contains("NoSuchKey"), "message: {message}");
        }
        other => panic!("Expected Execution error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_artifact_is_wrapped() {
    let engine = Arc::new(dml_engine(vec![ColumnInfo::new("a", "varchar")]));
    let store = Arc::new(
        MemoryObjectStore::new()
            .with_object(CSV_LOCATION, vec![b'"', b'a', b'"', b'\n', 0xff, 0xfe, b'\n'])
            .unwrap(),
    );
    let relay = relay(&engine, &store, RelayConfig::default());

    let err = relay.query("SELECT a FROM t").await.unwrap_err();

    assert!(matches!(err, RelayError::Execution(_)), "got {:?}", err);
    assert_eq!(err.category(), "Execution Error");
}
