//! Wire types for the query engine API.
//!
//! Field names follow the engine's JSON protocol (PascalCase).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier the engine assigns to one submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encryption applied to the result artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncryptionConfiguration {
    /// `SSE_S3`, `SSE_KMS` or `CSE_KMS`.
    pub encryption_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_configuration: Option<EncryptionConfiguration>,
}

/// Everything needed to submit one statement. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionRequest {
    pub query_string: String,
    pub query_execution_context: QueryExecutionContext,
    pub result_configuration: ResultConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_parameters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartQueryExecutionOutput {
    pub query_execution_id: String,
}

/// Raw engine state. Anything the engine invents later lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Other(String),
}

impl From<String> for QueryState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other(s),
        }
    }
}

impl From<QueryState> for String {
    fn from(state: QueryState) -> Self {
        state.as_str().to_string()
    }
}

impl QueryState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Other(s) => s,
        }
    }
}

/// Classification of a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatementKind {
    Utility,
    Ddl,
    Dml,
    Other(String),
}

impl From<String> for StatementKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UTILITY" => Self::Utility,
            "DDL" => Self::Ddl,
            "DML" => Self::Dml,
            _ => Self::Other(s),
        }
    }
}

impl From<StatementKind> for String {
    fn from(kind: StatementKind) -> Self {
        match kind {
            StatementKind::Utility => "UTILITY".to_string(),
            StatementKind::Ddl => "DDL".to_string(),
            StatementKind::Dml => "DML".to_string(),
            StatementKind::Other(s) => s,
        }
    }
}

impl StatementKind {
    /// UTILITY and DDL statements produce a line listing instead of CSV rows.
    pub fn is_listing(&self) -> bool {
        matches!(self, Self::Utility | Self::Ddl)
    }

    /// File suffix the engine gives the result artifact for this kind.
    pub fn artifact_suffix(&self) -> &'static str {
        if self.is_listing() {
            ".txt"
        } else {
            ".csv"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionStatus {
    pub state: Option<QueryState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_change_reason: Option<String>,
}

/// Engine-reported statistics, merged verbatim into the result envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_execution_time_in_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_scanned_in_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_execution_time_in_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_queue_time_in_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_planning_time_in_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_processing_time_in_millis: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecution {
    #[serde(default)]
    pub query_execution_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub statement_type: Option<StatementKind>,
    #[serde(default)]
    pub result_configuration: ResultConfiguration,
    #[serde(default)]
    pub status: QueryExecutionStatus,
    #[serde(default)]
    pub statistics: QueryStatistics,
}

impl QueryExecution {
    pub fn output_location(&self) -> Option<&str> {
        self.result_configuration.output_location.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryExecutionOutput {
    pub query_execution: QueryExecution,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsInput<'a> {
    pub query_execution_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<&'a str>,
}

/// One cell of an engine result page. A missing value means SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_char_value: Option<String>,
}

impl Datum {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            var_char_value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    #[serde(default)]
    pub data: Vec<Datum>,
}

impl ResultRow {
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: values.into_iter().map(Datum::text).collect(),
        }
    }
}

/// Column metadata as the engine reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "Type")]
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default)]
    pub rows: Vec<ResultRow>,
    #[serde(default)]
    pub result_set_metadata: ResultSetMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsOutput {
    #[serde(default)]
    pub result_set: ResultSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}
