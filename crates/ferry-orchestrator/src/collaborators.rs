//! Audit and notification collaborators
//!
//! Both are external systems: audit recording returns a ticket reference and
//! is best-effort (a failure degrades, never rolls back, a successful
//! transfer); notification is fire-and-forget. The HTTP implementations post
//! JSON with bounded retries and an optional HMAC-SHA256 signature header so
//! receivers can authenticate the payload.

use async_trait::async_trait;
use ferry_core::{FerryConfig, FerryError};
use ferry_engine::RetryPolicy;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-ferry-signature";

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Collaborator request failed: {0}")]
    Request(String),

    #[error("Collaborator returned status {0}")]
    Status(u16),
}

/// Outcome payload sent to the audit collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub transfer_id: Uuid,
    pub subject: String,
    pub outcome: String,
    pub detail: String,
    pub bytes_transferred: u64,
    pub checksum: Option<String>,
    pub attempts: u32,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record the outcome and return a ticket reference.
    async fn record_outcome(&self, report: &OutcomeReport) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        subject: &str,
        transfer_id: Uuid,
        outcome: &str,
    ) -> Result<(), CollaboratorError>;
}

fn sign_payload(secret: &str, body: &[u8]) -> Result<String, CollaboratorError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CollaboratorError::Request(format!("invalid signing secret: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Webhook-style audit client.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
    signing_secret: Option<String>,
    retry: RetryPolicy,
}

impl HttpAuditSink {
    pub fn new(
        endpoint: String,
        signing_secret: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;
        Ok(HttpAuditSink {
            client,
            endpoint,
            signing_secret,
            retry,
        })
    }

    async fn post_once(&self, body: &[u8]) -> Result<String, CollaboratorError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .body(body.to_vec());

        if let Some(ref secret) = self.signing_secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, body)?);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status(status.as_u16()));
        }

        let ticket = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|value| {
                value
                    .get("ticket_ref")
                    .or_else(|| value.get("ticket"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            });
        Ok(ticket.unwrap_or_default())
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record_outcome(&self, report: &OutcomeReport) -> Result<String, CollaboratorError> {
        let body = serde_json::to_vec(report)
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;

        let mut attempt = 0u32;
        loop {
            match self.post_once(&body).await {
                Ok(ticket) => {
                    let ticket = if ticket.is_empty() {
                        format!("audit-{}", report.transfer_id)
                    } else {
                        ticket
                    };
                    tracing::info!(
                        transfer_id = %report.transfer_id,
                        ticket_ref = %ticket,
                        outcome = %report.outcome,
                        "Audit outcome recorded"
                    );
                    return Ok(ticket);
                }
                // 4xx means the payload itself is refused; retrying cannot help.
                Err(CollaboratorError::Status(status)) if (400..500).contains(&status) => {
                    return Err(CollaboratorError::Status(status));
                }
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        transfer_id = %report.transfer_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Audit delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fallback audit sink: structured log entry only.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record_outcome(&self, report: &OutcomeReport) -> Result<String, CollaboratorError> {
        tracing::info!(
            transfer_id = %report.transfer_id,
            subject = %report.subject,
            outcome = %report.outcome,
            detail = %report.detail,
            bytes_transferred = report.bytes_transferred,
            attempts = report.attempts,
            "Transfer outcome"
        );
        Ok(format!("log-{}", report.transfer_id))
    }
}

/// Webhook-style notifier; single attempt, fire-and-forget.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;
        Ok(HttpNotifier { client, endpoint })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(
        &self,
        subject: &str,
        transfer_id: Uuid,
        outcome: &str,
    ) -> Result<(), CollaboratorError> {
        let payload = serde_json::json!({
            "subject": subject,
            "transfer_id": transfer_id,
            "outcome": outcome,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Fallback notifier: structured log entry only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        subject: &str,
        transfer_id: Uuid,
        outcome: &str,
    ) -> Result<(), CollaboratorError> {
        tracing::info!(
            subject = %subject,
            transfer_id = %transfer_id,
            outcome = %outcome,
            "Transfer notification"
        );
        Ok(())
    }
}

pub fn audit_sink_from_config(config: &FerryConfig) -> Result<Arc<dyn AuditSink>, FerryError> {
    match config.audit_endpoint {
        Some(ref endpoint) => {
            let sink = HttpAuditSink::new(
                endpoint.clone(),
                config.audit_signing_secret.clone(),
                config.collaborator_timeout(),
                RetryPolicy {
                    max_retries: config.collaborator_max_retries,
                    base_delay: config.retry_base_delay(),
                    max_delay: config.retry_max_delay(),
                },
            )
            .map_err(|e| FerryError::Collaborator(e.to_string()))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogAuditSink)),
    }
}

pub fn notifier_from_config(config: &FerryConfig) -> Result<Arc<dyn Notifier>, FerryError> {
    match config.notify_endpoint {
        Some(ref endpoint) => {
            let notifier = HttpNotifier::new(endpoint.clone(), config.collaborator_timeout())
                .map_err(|e| FerryError::Collaborator(e.to_string()))?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_for_same_payload() {
        let a = sign_payload("secret", b"{\"outcome\":\"completed\"}").unwrap();
        let b = sign_payload("secret", b"{\"outcome\":\"completed\"}").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
    }

    #[test]
    fn signature_differs_across_secrets() {
        let a = sign_payload("secret-a", b"payload").unwrap();
        let b = sign_payload("secret-b", b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn log_audit_sink_returns_a_ticket_ref() {
        let report = OutcomeReport {
            transfer_id: Uuid::new_v4(),
            subject: "user@example.com".to_string(),
            outcome: "completed".to_string(),
            detail: "52428800 bytes transferred".to_string(),
            bytes_transferred: 52_428_800,
            checksum: Some("abc".to_string()),
            attempts: 1,
        };
        let ticket = LogAuditSink.record_outcome(&report).await.unwrap();
        assert!(ticket.contains(&report.transfer_id.to_string()));
    }
}
