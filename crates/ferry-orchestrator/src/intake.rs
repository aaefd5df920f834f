//! Transfer request intake
//!
//! Requests are accepted or rejected synchronously. Rejection happens before
//! any session is requested, so a malformed request never burns an approval
//! reference.

use ferry_core::{validation, FerryError, TransferPlan};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: String,

    #[validate(length(min = 1, message = "approval reference must not be empty"))]
    pub approval_reference: String,

    #[validate(nested)]
    pub plan: TransferPlan,
}

impl TransferRequest {
    /// Schema and format checks. Source existence is deliberately not checked
    /// here; it requires credentials and happens during planning.
    pub fn check(&self) -> Result<(), FerryError> {
        self.validate()?;
        if !validation::is_valid_approval_reference(&self.approval_reference) {
            return Err(FerryError::Validation(format!(
                "approval reference {} does not match the expected format",
                self.approval_reference
            )));
        }
        self.plan.check().map_err(FerryError::Validation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{DestinationProtocol, DestinationSpec, Secret, SourceLocation};

    fn request() -> TransferRequest {
        TransferRequest {
            subject: "user@example.com".to_string(),
            approval_reference: "REQ-1001".to_string(),
            plan: TransferPlan {
                source: SourceLocation {
                    container: "finance-exports".to_string(),
                    object_key: "reports/q3.csv".to_string(),
                },
                destination: DestinationSpec {
                    protocol: DestinationProtocol::Sftp,
                    host: "drop.example.com".to_string(),
                    port: 22,
                    username: "ferry".to_string(),
                    password: Secret::new("pw"),
                    remote_path: "/incoming".to_string(),
                    remote_filename: None,
                },
                checksum_expected: None,
            },
        }
    }

    #[test]
    fn well_formed_request_is_accepted() {
        assert!(request().check().is_ok());
    }

    #[test]
    fn malformed_approval_reference_is_rejected() {
        let mut req = request();
        req.approval_reference = "TICKET-9".to_string();
        let err = req.check().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut req = request();
        req.plan.destination.host = String::new();
        assert!(req.check().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut req = request();
        req.plan.destination.port = 0;
        assert!(req.check().is_err());
    }

    #[test]
    fn traversal_object_key_is_rejected() {
        let mut req = request();
        req.plan.source.object_key = "../../secrets".to_string();
        assert!(req.check().is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let mut req = request();
        req.subject = String::new();
        assert!(req.check().is_err());
    }
}
