//! The value handed back for one query lifecycle.

use serde::Serialize;

use crate::decode::Item;
use crate::engine::QueryStatistics;

/// Price of one scanned megabyte ($5 per terabyte).
pub const COST_PER_MB: f64 = 0.000004768;

pub const BYTES_IN_MB: f64 = 1_048_576.0;

/// Queries are billed for at least this many megabytes.
pub const MINIMUM_BILLED_MB: u64 = 10;

/// Result of one query lifecycle, serialized with the engine's field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultEnvelope {
    /// Absent when results were skipped or not waited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    pub query_execution_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,

    #[serde(flatten)]
    pub statistics: Option<ExecutionStatistics>,
}

impl ResultEnvelope {
    /// An envelope carrying only the execution id.
    pub fn pending(query_execution_id: impl Into<String>) -> Self {
        Self {
            query_execution_id: query_execution_id.into(),
            ..Default::default()
        }
    }

    pub fn items(&self) -> &[Item] {
        self.items.as_deref().unwrap_or_default()
    }
}

/// Scan size, cost and timings for a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStatistics {
    #[serde(rename = "DataScannedInMB")]
    pub data_scanned_in_mb: u64,

    #[serde(rename = "QueryCostInUSD")]
    pub query_cost_in_usd: f64,

    /// Number of items in this envelope.
    #[serde(rename = "Count")]
    pub count: usize,

    #[serde(rename = "S3Location", skip_serializing_if = "Option::is_none")]
    pub s3_location: Option<String>,

    /// Engine-reported figures, passed through unchanged.
    #[serde(flatten)]
    pub engine: QueryStatistics,
}

impl ExecutionStatistics {
    pub fn compute(engine: &QueryStatistics, count: usize, s3_location: Option<&str>) -> Self {
        let data_scanned_in_mb = scanned_megabytes(engine.data_scanned_in_bytes.unwrap_or(0));
        Self {
            data_scanned_in_mb,
            query_cost_in_usd: query_cost(data_scanned_in_mb),
            count,
            s3_location: s3_location.map(String::from),
            engine: engine.clone(),
        }
    }
}

/// Bytes to whole megabytes, rounded half up.
pub fn scanned_megabytes(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_IN_MB).round() as u64
}

pub fn query_cost(megabytes: u64) -> f64 {
    megabytes.max(MINIMUM_BILLED_MB) as f64 * COST_PER_MB
}
