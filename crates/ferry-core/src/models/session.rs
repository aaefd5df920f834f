use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthorizationError;
use crate::models::plan::Secret;
use crate::validation;

/// External identifier of a pre-authorized request. Consumed exactly once by
/// the session broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ApprovalReference(String);

impl ApprovalReference {
    /// Validate the external format and wrap the reference.
    pub fn parse(value: &str) -> Result<Self, AuthorizationError> {
        if validation::is_valid_approval_reference(value) {
            Ok(ApprovalReference(value.to_string()))
        } else {
            Err(AuthorizationError::ApprovalInvalid(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ApprovalReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for ApprovalReference {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApprovalReference::parse(s)
    }
}

/// Ephemeral, least-privilege access material issued by the identity
/// provider. Secrets never appear in Debug output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
    pub region: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A single-use, time-boxed authorization bound to one approval reference.
///
/// The window between `issued_at` and `expires_at` is fixed at creation and
/// no operation extends it. Validity additionally requires the session not to
/// have been consumed; the consumed bit lives in the backing store so the
/// check-and-set is atomic across concurrent orchestrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub subject: String,
    pub approval_reference: ApprovalReference,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub credentials: Credentials,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_credentials() -> Credentials {
        Credentials {
            access_key_id: "ASIATEST123456789".to_string(),
            secret_access_key: Secret::new("shhh-key-material"),
            session_token: Some(Secret::new("shhh-session-token")),
            region: Some("us-east-1".to_string()),
            expires_at: None,
        }
    }

    #[test]
    fn approval_reference_parse_enforces_format() {
        assert!(ApprovalReference::parse("REQ-1001").is_ok());
        assert!(matches!(
            ApprovalReference::parse("bogus"),
            Err(AuthorizationError::ApprovalInvalid(_))
        ));
    }

    #[test]
    fn session_expiry_is_a_hard_boundary() {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4(),
            subject: "user@example.com".to_string(),
            approval_reference: ApprovalReference::parse("REQ-1001").unwrap(),
            issued_at: now,
            expires_at: now + Duration::seconds(10),
            credentials: sample_credentials(),
        };

        assert!(!session.is_expired(now));
        assert!(!session.is_expired(now + Duration::seconds(9)));
        assert!(session.is_expired(now + Duration::seconds(10)));
        assert!(session.is_expired(now + Duration::seconds(11)));
        assert_eq!(session.seconds_remaining(now + Duration::seconds(11)), 0);
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let rendered = format!("{:?}", sample_credentials());
        assert!(!rendered.contains("shhh"));
        assert!(rendered.contains("[redacted]"));
    }
}
