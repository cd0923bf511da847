//! In-memory object store for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{RelayError, Result};
use crate::store::{ByteStream, ObjectLocation, ObjectStore};

/// Objects held in memory, served in fixed-size chunks.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectLocation, Vec<u8>>>,
    chunk_size: usize,
    reads: AtomicUsize,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            chunk_size: 64,
            reads: AtomicUsize::new(0),
        }
    }

    /// Adds an object at an `s3://` URI.
    pub fn with_object(self, uri: &str, body: impl Into<Vec<u8>>) -> Result<Self> {
        let location = ObjectLocation::parse(uri)?;
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(location, body.into());
        Ok(self)
    }

    /// Changes how many bytes each streamed chunk carries.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of `get_object` calls made.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, location: &ObjectLocation) -> Result<ByteStream> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let body = self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(location)
            .cloned()
            .ok_or_else(|| RelayError::object_store(format!("NoSuchKey: {location}")))?;

        let chunks: Vec<Result<Vec<u8>>> = body
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}
