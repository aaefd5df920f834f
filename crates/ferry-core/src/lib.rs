//! Ferry Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! validation that are shared across all ferry components.

pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use config::{FerryConfig, SourceBackend, SourceConfig};
pub use error::{AuthorizationError, FerryError};
pub use models::plan::{DestinationProtocol, DestinationSpec, Secret, SourceLocation, TransferPlan};
pub use models::record::{RecordedError, TransferRecord, TransferState, TransferStrategy};
pub use models::session::{ApprovalReference, Credentials, Session};
