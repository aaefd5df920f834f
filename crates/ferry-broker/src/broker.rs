//! Session broker
//!
//! Sessions live in the key-value store under the fixed short TTL; approval
//! markers live there under the long retention TTL. Replay prevention and
//! single-consumer semantics both ride on the store's atomic
//! `consume_if_unused`, so concurrent orchestrators cannot double-spend a
//! reference or a session.

use chrono::Utc;
use ferry_core::{
    ApprovalReference, AuthorizationError, Credentials, FerryError, Session, TransferPlan,
};
use ferry_store::{KeyValueStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::provider::{CredentialProvider, CredentialScope, ProviderError};

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Fixed session validity window. No operation extends it.
    pub session_ttl: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            session_ttl: Duration::from_secs(10),
        }
    }
}

pub struct SessionBroker {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn CredentialProvider>,
    config: BrokerConfig,
}

fn session_key(token: Uuid) -> String {
    format!("session/{}", token)
}

fn approval_key(reference: &ApprovalReference) -> String {
    format!("approval/{}", reference)
}

fn store_err(err: StoreError) -> FerryError {
    FerryError::TransientInfrastructure(err.to_string())
}

impl SessionBroker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn CredentialProvider>,
        config: BrokerConfig,
    ) -> Self {
        SessionBroker {
            store,
            provider,
            config,
        }
    }

    /// Validate the approval reference, burn it, and mint a session.
    ///
    /// The reference is consumed atomically before credentials are requested;
    /// if issuance then fails, the marker is released so a retried call is
    /// not misreported as a replay.
    pub async fn authenticate(
        &self,
        subject: &str,
        approval_reference: &str,
        plan: &TransferPlan,
    ) -> Result<Session, FerryError> {
        let reference = ApprovalReference::parse(approval_reference)?;
        let marker = approval_key(&reference);

        let fresh = self.store.consume_if_unused(&marker).await.map_err(store_err)?;
        if !fresh {
            tracing::warn!(
                subject = %subject,
                approval_reference = %reference,
                "Replay attempt rejected"
            );
            return Err(AuthorizationError::ReplayDetected(reference.to_string()).into());
        }

        let scope = CredentialScope {
            source_container: plan.source.container.clone(),
            destination_protocol: plan.destination.protocol,
        };

        let credentials = match self
            .provider
            .issue_ephemeral_credentials(subject, &scope)
            .await
        {
            Ok(credentials) => credentials,
            Err(e) => {
                // Release the marker so an infrastructure retry of this same
                // reference is not a false replay.
                let _ = self.store.delete(&marker).await;
                return Err(match e {
                    ProviderError::Denied(msg) => {
                        AuthorizationError::CredentialIssuanceFailed(msg).into()
                    }
                    ProviderError::Unavailable(msg) => FerryError::TransientInfrastructure(msg),
                });
            }
        };

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));
        let session = Session {
            token: Uuid::new_v4(),
            subject: subject.to_string(),
            approval_reference: reference.clone(),
            issued_at: now,
            expires_at: now + ttl,
            credentials,
        };

        let value = serde_json::to_value(&session)
            .map_err(|e| FerryError::TransientInfrastructure(e.to_string()))?;
        self.store
            .put(&session_key(session.token), value, Some(self.config.session_ttl))
            .await
            .map_err(store_err)?;

        tracing::info!(
            subject = %subject,
            approval_reference = %reference,
            session_token = %session.token,
            expires_at = %session.expires_at,
            "Session created"
        );

        Ok(session)
    }

    /// True iff the session exists, is unexpired, and has not been consumed.
    pub async fn is_valid(&self, token: Uuid) -> bool {
        match self.store.status(&session_key(token)).await {
            Ok(Some(status)) => !status.consumed,
            _ => false,
        }
    }

    /// Fetch credentials without consuming the session.
    pub async fn credentials_for(&self, token: Uuid) -> Result<Credentials, FerryError> {
        let key = session_key(token);
        let status = self.store.status(&key).await.map_err(store_err)?;
        let Some(status) = status else {
            return Err(AuthorizationError::SessionNotFound.into());
        };
        if status.consumed {
            return Err(AuthorizationError::SessionExpired.into());
        }

        let session = self.load_session(&key).await?;
        if session.is_expired(Utc::now()) {
            return Err(AuthorizationError::SessionExpired.into());
        }
        Ok(session.credentials)
    }

    /// Atomically redeem the session for its credentials.
    ///
    /// The single-consumer gate: the first caller gets the credentials, every
    /// later caller (and any caller after expiry) gets `SessionExpired`.
    pub async fn consume(&self, token: Uuid) -> Result<Credentials, FerryError> {
        let key = session_key(token);
        let session = self.load_session(&key).await?;
        if session.is_expired(Utc::now()) {
            return Err(AuthorizationError::SessionExpired.into());
        }

        let won = self.store.consume_if_unused(&key).await.map_err(store_err)?;
        if !won {
            return Err(AuthorizationError::SessionExpired.into());
        }

        tracing::info!(
            session_token = %token,
            subject = %session.subject,
            "Session consumed"
        );

        Ok(session.credentials)
    }

    /// Invalidate the session immediately. Idempotent; the approval marker
    /// stays burned.
    pub async fn invalidate(&self, token: Uuid) -> Result<(), FerryError> {
        self.store
            .delete(&session_key(token))
            .await
            .map_err(store_err)?;
        tracing::debug!(session_token = %token, "Session invalidated");
        Ok(())
    }

    async fn load_session(&self, key: &str) -> Result<Session, FerryError> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(store_err)?
            .ok_or(AuthorizationError::SessionNotFound)?;
        serde_json::from_value(value)
            .map_err(|e| FerryError::TransientInfrastructure(e.to_string()))
    }
}
