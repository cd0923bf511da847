//! Object store abstraction.
//!
//! Result artifacts are read as a byte stream from `s3://bucket/key`
//! locations reported by the engine.

mod http;
mod memory;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use url::Url;

use crate::error::{RelayError, Result};

/// Chunks of an object body as they arrive.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Trait defining read access to the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Opens the object for streaming.
    async fn get_object(&self, location: &ObjectLocation) -> Result<ByteStream>;
}

/// A bucket/key pair parsed from an `s3://` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parses `s3://bucket/path/to/key`.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| RelayError::object_store(format!("Invalid object location '{uri}': {e}")))?;

        if url.scheme() != "s3" {
            return Err(RelayError::object_store(format!(
                "Invalid scheme '{}' in '{}'. Expected 's3'",
                url.scheme(),
                uri
            )));
        }

        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| RelayError::object_store(format!("Missing bucket in '{uri}'")))?;

        // Keys are taken from the raw text so percent-encoding is not altered.
        let key = uri
            .splitn(4, '/')
            .nth(3)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RelayError::object_store(format!("Missing key in '{uri}'")))?;

        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
