//! Destination abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Destination write errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    #[error("Destination rejected credentials: {0}")]
    AuthRejected(String),

    #[error("Destination I/O failed: {0}")]
    Io(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Transport configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Connection and I/O failures may clear on retry; credential rejection
    /// and contract violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unreachable(_) | TransportError::Io(_))
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// What a backend can do beyond sequential writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// Acknowledged bytes survive a reconnect, so an interrupted transfer can
    /// continue from the committed size instead of byte zero.
    pub resume: bool,
    /// Writes at arbitrary offsets are possible (seek semantics), which the
    /// parallel-chunked strategy requires.
    pub random_write: bool,
}

/// Write-side view of one destination endpoint.
#[async_trait]
pub trait DestinationTransport: Send + Sync {
    /// Protocol label for logs and records.
    fn scheme(&self) -> &'static str;

    fn capabilities(&self) -> TransportCapabilities;

    /// Connect and authenticate without transferring anything.
    async fn verify_auth(&self) -> TransportResult<()>;

    /// Size of the remote object as acknowledged by the destination, or
    /// `None` when it does not exist yet.
    async fn committed_size(&self, remote_path: &str) -> TransportResult<Option<u64>>;

    /// Create the remote object empty, discarding any previous content.
    /// Called once before a transfer starts from byte zero; `write_chunk`
    /// itself never truncates.
    async fn truncate(&self, remote_path: &str) -> TransportResult<()>;

    /// Place `data` at `offset` per the offset-write contract.
    async fn write_chunk(&self, remote_path: &str, offset: u64, data: Bytes)
        -> TransportResult<()>;

    /// Remove the remote object. Removing an absent object is not an error.
    async fn remove(&self, remote_path: &str) -> TransportResult<()>;

    /// Close the cached connection, if any. The transport reconnects on the
    /// next operation.
    async fn close(&self) -> TransportResult<()>;
}
