//! Error types module
//!
//! All failures that cross a component boundary are expressed through
//! [`FerryError`]. The variants map one-to-one onto the retry policy: the
//! orchestrator only ever retries `TransientInfrastructure`, everything else
//! is terminal for the attempt that produced it.

use thiserror::Error;

/// Authorization failures raised by the session broker.
///
/// None of these are retryable: a replayed or malformed approval reference
/// will not become valid by waiting, and an expired session can only be
/// replaced by a fresh `authenticate` call with a new approval reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("approval reference {0} has already been used")]
    ReplayDetected(String),

    #[error("approval reference is not valid: {0}")]
    ApprovalInvalid(String),

    #[error("session has expired")]
    SessionExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("credential issuance was refused: {0}")]
    CredentialIssuanceFailed(String),
}

#[derive(Debug, Error)]
pub enum FerryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("infrastructure failure: {0}")]
    TransientInfrastructure(String),

    #[error("transfer failed after {attempts} attempt(s): {message}")]
    Transfer { message: String, attempts: u32 },

    #[error("integrity check failed: expected {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    #[error("collaborator call failed: {0}")]
    Collaborator(String),
}

impl FerryError {
    /// Machine-readable taxonomy kind, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            FerryError::Validation(_) => "validation",
            FerryError::Authorization(_) => "authorization",
            FerryError::TransientInfrastructure(_) => "transient_infrastructure",
            FerryError::Transfer { .. } => "transfer",
            FerryError::Integrity { .. } => "integrity",
            FerryError::Collaborator(_) => "collaborator",
        }
    }

    /// Whether the failed operation may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FerryError::TransientInfrastructure(_))
    }
}

impl From<validator::ValidationErrors> for FerryError {
    fn from(err: validator::ValidationErrors) -> Self {
        FerryError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for FerryError {
    fn from(err: serde_json::Error) -> Self {
        FerryError::TransientInfrastructure(format!("serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_errors_are_terminal() {
        let err = FerryError::from(AuthorizationError::ReplayDetected("REQ-1001".to_string()));
        assert_eq!(err.kind(), "authorization");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_infrastructure_is_retryable() {
        let err = FerryError::TransientInfrastructure("identity provider timeout".to_string());
        assert_eq!(err.kind(), "transient_infrastructure");
        assert!(err.is_retryable());
    }

    #[test]
    fn integrity_is_distinct_from_transfer() {
        let integrity = FerryError::Integrity {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        let transfer = FerryError::Transfer {
            message: "connection reset".to_string(),
            attempts: 3,
        };
        assert_eq!(integrity.kind(), "integrity");
        assert_eq!(transfer.kind(), "transfer");
        assert!(!integrity.is_retryable());
        assert!(!transfer.is_retryable());
    }

    #[test]
    fn transfer_error_reports_attempt_count() {
        let err = FerryError::Transfer {
            message: "timed out".to_string(),
            attempts: 3,
        };
        assert!(err.to_string().contains("3 attempt"));
    }
}
