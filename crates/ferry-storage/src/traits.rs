//! Source abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::ops::Range;
use std::pin::Pin;
use thiserror::Error;

/// Source read errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Source read failed: {0}")]
    ReadFailed(String),

    #[error("Source access denied: {0}")]
    AccessDenied(String),

    #[error("Source configuration error: {0}")]
    Config(String),
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Size and identity metadata for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub e_tag: Option<String>,
}

/// Stream of object bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = SourceResult<Bytes>> + Send>>;

/// Read-side view of the source object store.
///
/// Implementations are scoped to one container; the object key addresses an
/// object inside it.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Size and metadata query, used for strategy selection.
    async fn stat(&self, object_key: &str) -> SourceResult<ObjectStat>;

    /// Read the byte range `[range.start, range.end)`.
    async fn read_range(&self, object_key: &str, range: Range<u64>) -> SourceResult<Bytes>;

    /// Stream the whole object from byte zero.
    async fn read_stream(&self, object_key: &str) -> SourceResult<ByteStream>;

    async fn exists(&self, object_key: &str) -> SourceResult<bool>;
}
