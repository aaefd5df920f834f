//! Ferry Engine Library
//!
//! Streaming transfer engine: moves bytes from an [`ObjectSource`] to a
//! [`DestinationTransport`] in bounded-size chunks, optionally in parallel,
//! with chunk-level retry and checksum computation. The engine knows nothing
//! about sessions, approvals, or workflow state; progress flows back to the
//! caller through a callback and is never persisted here.
//!
//! [`ObjectSource`]: ferry_storage::ObjectSource
//! [`DestinationTransport`]: ferry_transport::DestinationTransport

pub mod checksum;
pub mod chunks;
mod chunked;
mod direct;
pub mod engine;
pub mod error;
mod parallel;
pub mod progress;
pub mod retry;

pub use checksum::{combine_digests, digest_chunk, ChunkedSha256};
pub use chunks::{partition, Chunk};
pub use engine::{EngineConfig, TransferEngine, TransferOutcome, TransferSpec};
pub use error::EngineError;
pub use progress::{noop_progress, ProgressCallback, ProgressUpdate};
pub use retry::RetryPolicy;
