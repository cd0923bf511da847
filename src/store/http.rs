//! HTTP object store client.
//!
//! Reads objects with path-style `GET {endpoint}/{bucket}/{key}` requests and
//! streams the body back chunk by chunk.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{RelayError, Result};
use crate::store::{ByteStream, ObjectLocation, ObjectStore};

/// Default timeout for establishing a download (seconds).
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Object store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    endpoint: Url,
    authorization: Option<String>,
    client: Client,
}

impl HttpObjectStore {
    /// Creates a new client for the given endpoint.
    pub fn new(endpoint: &str, authorization: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RelayError::configuration(format!("Invalid store endpoint: {e}")))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                RelayError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            endpoint,
            authorization,
            client,
        })
    }

    /// Builds the request URL for a location.
    fn object_url(&self, location: &ObjectLocation) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}/{}", base, location.bucket, location.key))
            .map_err(|e| RelayError::object_store(format!("Invalid object URL for {location}: {e}")))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, location: &ObjectLocation) -> Result<ByteStream> {
        let url = self.object_url(location)?;
        debug!("Fetching result artifact {}", location);

        let mut request = self.client.get(url);
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::object_store(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(status, location, &body));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| RelayError::object_store(format!("Stream error: {}", e)))
        });

        Ok(stream.boxed())
    }
}

fn map_status_error(status: StatusCode, location: &ObjectLocation, body: &str) -> RelayError {
    match status {
        StatusCode::NOT_FOUND => RelayError::object_store(format!("NoSuchKey: {location}")),
        StatusCode::FORBIDDEN => RelayError::object_store(format!("AccessDenied: {location}")),
        _ => RelayError::object_store(format!("{} reading {}: {}", status, location, body.trim())),
    }
}
