//! Ferry Storage Library
//!
//! Read-side abstraction over the source object store. The engine only ever
//! needs three operations: a size/metadata query, ranged reads, and a
//! whole-object stream. Backends are feature-gated; the factory picks one
//! from configuration and the session's ephemeral credentials.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_source;
#[cfg(feature = "storage-local")]
pub use local::LocalObjectSource;
#[cfg(feature = "storage-s3")]
pub use s3::S3ObjectSource;
pub use traits::{ByteStream, ObjectSource, ObjectStat, SourceError, SourceResult};
