//! HTTP query engine client.
//!
//! Speaks the engine's JSON 1.1 protocol: every operation is a POST to the
//! service endpoint with an `X-Amz-Target` header naming the operation.
//! Request signing is out of scope; an optional pre-computed `Authorization`
//! header is forwarded verbatim (for signing proxies and local emulators).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::engine::{
    EngineError, EngineResult, ExecutionHandle, ExecutionRequest, GetQueryExecutionOutput,
    GetQueryResultsInput, GetQueryResultsOutput, QueryEngine, QueryExecution,
    StartQueryExecutionOutput,
};
use crate::error::{RelayError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Target prefix for engine operations.
const TARGET_PREFIX: &str = "AmazonAthena";

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// HTTP engine client configuration.
#[derive(Debug, Clone)]
pub struct HttpQueryEngineConfig {
    /// Service endpoint, e.g. `https://athena.us-east-1.amazonaws.com`.
    pub endpoint: Url,
    /// Forwarded as the `Authorization` header when set.
    pub authorization: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpQueryEngineConfig {
    /// Creates a config for the given endpoint.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RelayError::configuration(format!("Invalid engine endpoint: {e}")))?;
        Ok(Self {
            endpoint,
            authorization: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Query engine reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpQueryEngine {
    config: HttpQueryEngineConfig,
    client: Client,
}

impl HttpQueryEngine {
    /// Creates a new client with the given configuration.
    pub fn new(config: HttpQueryEngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> EngineResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("Engine request {}", operation);

        let mut request = self
            .client
            .post(self.config.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(body);
        if let Some(auth) = &self.config.authorization {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await.map_err(map_request_error)?;
        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::networking(format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                EngineError::new(
                    "SerializationException",
                    format!("Failed to parse {operation} response: {e}"),
                )
            });
        }

        Err(parse_error(status, error_type.as_deref(), &body))
    }
}

#[async_trait]
impl QueryEngine for HttpQueryEngine {
    async fn start_query_execution(&self, request: &ExecutionRequest) -> EngineResult<String> {
        let output: StartQueryExecutionOutput = self.call("StartQueryExecution", request).await?;
        Ok(output.query_execution_id)
    }

    async fn get_query_execution(&self, handle: &ExecutionHandle) -> EngineResult<QueryExecution> {
        let body = QueryExecutionIdInput {
            query_execution_id: handle.as_str(),
        };
        let output: GetQueryExecutionOutput = self.call("GetQueryExecution", &body).await?;
        Ok(output.query_execution)
    }

    async fn get_query_results(
        &self,
        handle: &ExecutionHandle,
        max_results: Option<u32>,
        next_token: Option<&str>,
    ) -> EngineResult<GetQueryResultsOutput> {
        let body = GetQueryResultsInput {
            query_execution_id: handle.as_str(),
            max_results,
            next_token,
        };
        self.call("GetQueryResults", &body).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionIdInput<'a> {
    query_execution_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Maps a transport failure onto an engine error code.
fn map_request_error(error: reqwest::Error) -> EngineError {
    if error.is_builder() {
        EngineError::new("UnknownEndpoint", format!("Invalid endpoint: {}", error))
    } else if error.is_timeout() {
        EngineError::networking("Request timed out")
    } else {
        EngineError::networking(format!("Request failed: {}", error))
    }
}

/// Builds an engine error from a non-success response.
///
/// The code comes from the `__type` field (`namespace#Code`), falling back to
/// the `x-amzn-ErrorType` header and finally the HTTP status.
fn parse_error(status: StatusCode, error_type: Option<&str>, body: &str) -> EngineError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|p| p.error_type.as_deref())
        .or(error_type)
        .map(strip_error_namespace)
        .unwrap_or_else(|| match status {
            StatusCode::TOO_MANY_REQUESTS => "TooManyRequestsException".to_string(),
            _ => format!("Http{}", status.as_u16()),
        });

    let message = parsed
        .and_then(|p| p.message)
        .unwrap_or_else(|| body.trim().to_string());

    EngineError::new(code, message)
}

/// `com.amazonaws.athena#ThrottlingException` -> `ThrottlingException`.
///
/// The header form may also carry a `:uri` suffix.
fn strip_error_namespace(raw: &str) -> String {
    let without_uri = raw.split(':').next().unwrap_or(raw);
    without_uri
        .rsplit('#')
        .next()
        .unwrap_or(without_uri)
        .to_string()
}
