//! Identity/credential provider interface
//!
//! The broker requests ephemeral, least-privilege credentials here. Scope is
//! always read-only on the source container and as narrow as the destination
//! protocol requires; issuance policy itself (who may assume what) lives in
//! the external provider, not in ferry.

use async_trait::async_trait;
use chrono::Utc;
use ferry_core::{Credentials, DestinationProtocol, Secret};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Permanent refusal; retrying with the same inputs cannot succeed.
    #[error("Credential issuance denied: {0}")]
    Denied(String),

    /// The provider could not be reached; the caller may retry.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Requested authority for one transfer.
#[derive(Debug, Clone)]
pub struct CredentialScope {
    pub source_container: String,
    pub destination_protocol: DestinationProtocol,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn issue_ephemeral_credentials(
        &self,
        subject: &str,
        scope: &CredentialScope,
    ) -> Result<Credentials, ProviderError>;
}

/// Provider backed by credential material in the environment.
///
/// Stamps each issuance with the configured validity window so downstream
/// components can see when the material lapses.
pub struct EnvCredentialProvider {
    validity: Duration,
}

impl EnvCredentialProvider {
    pub fn new(validity: Duration) -> Self {
        EnvCredentialProvider { validity }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn issue_ephemeral_credentials(
        &self,
        subject: &str,
        scope: &CredentialScope,
    ) -> Result<Credentials, ProviderError> {
        let access_key_id = env::var("FERRY_SOURCE_ACCESS_KEY_ID")
            .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
            .map_err(|_| {
                ProviderError::Denied("No source credential material configured".to_string())
            })?;
        let secret_access_key = env::var("FERRY_SOURCE_SECRET_ACCESS_KEY")
            .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
            .map_err(|_| {
                ProviderError::Denied("No source credential material configured".to_string())
            })?;
        let session_token = env::var("FERRY_SOURCE_SESSION_TOKEN")
            .or_else(|_| env::var("AWS_SESSION_TOKEN"))
            .ok();
        let region = env::var("AWS_REGION").ok();

        tracing::debug!(
            subject = %subject,
            container = %scope.source_container,
            protocol = %scope.destination_protocol,
            "Issued environment-backed credentials"
        );

        Ok(Credentials {
            access_key_id,
            secret_access_key: Secret::new(secret_access_key),
            session_token: session_token.map(Secret::new),
            region,
            expires_at: Some(
                Utc::now()
                    + chrono::Duration::from_std(self.validity)
                        .unwrap_or_else(|_| chrono::Duration::seconds(10)),
            ),
        })
    }
}

/// Provider returning fixed credentials. Used in tests and local setups.
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    pub fn new(credentials: Credentials) -> Self {
        StaticCredentialProvider { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn issue_ephemeral_credentials(
        &self,
        _subject: &str,
        _scope: &CredentialScope,
    ) -> Result<Credentials, ProviderError> {
        Ok(self.credentials.clone())
    }
}
