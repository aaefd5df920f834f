//! Ferry Store Library
//!
//! Key-value store abstraction with per-item expiration and an atomic
//! consume-and-check primitive. The session broker keeps session records and
//! approval markers here; the orchestrator keeps transfer records here. The
//! bundled [`MemoryStore`] backend is safe under concurrent access and runs a
//! background sweep for expired entries.

pub mod memory;
pub mod traits;

pub use memory::{MemoryStore, MemoryStoreConfig};
pub use traits::{EntryStatus, KeyValueStore, StoreError, StoreResult};
