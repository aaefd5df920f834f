//! Transfer state machine
//!
//! Phase ordering is strict: no phase begins before the prior phase's
//! terminal outcome is written to the store. Retry policy per phase:
//! authenticating retries transient identity-provider failures, transferring
//! retries transient I/O failures through the `Retrying` pseudo-state, and
//! everything else is single-shot. `CleaningUp` always runs, success or
//! failure, so the session is invalidated on every path.

use async_trait::async_trait;
use chrono::Utc;
use ferry_broker::SessionBroker;
use ferry_core::{
    Credentials, DestinationSpec, FerryConfig, FerryError, RecordedError, Session, SourceConfig,
    TransferRecord, TransferState, TransferStrategy,
};
use ferry_engine::{
    partition, EngineConfig, EngineError, ProgressCallback, ProgressUpdate, RetryPolicy,
    TransferEngine, TransferOutcome, TransferSpec,
};
use ferry_storage::{ObjectSource, SourceError};
use ferry_store::KeyValueStore;
use ferry_transport::DestinationTransport;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::collaborators::{AuditSink, Notifier, OutcomeReport};
use crate::intake::TransferRequest;
use crate::records::TransferRecordStore;

/// Builds an object source once the session's credentials exist.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn create(
        &self,
        container: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ObjectSource>, FerryError>;
}

/// Builds a destination transport from the plan.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        destination: &DestinationSpec,
    ) -> Result<Arc<dyn DestinationTransport>, FerryError>;
}

/// Factory delegating to the configured source backend.
pub struct ConfigSourceFactory {
    config: SourceConfig,
}

impl ConfigSourceFactory {
    pub fn new(config: SourceConfig) -> Self {
        ConfigSourceFactory { config }
    }
}

#[async_trait]
impl SourceFactory for ConfigSourceFactory {
    async fn create(
        &self,
        container: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ObjectSource>, FerryError> {
        ferry_storage::create_source(&self.config, container, credentials)
            .await
            .map_err(|e| FerryError::Validation(e.to_string()))
    }
}

/// Factory delegating to the protocol-selected transport backend.
pub struct ConfigTransportFactory;

#[async_trait]
impl TransportFactory for ConfigTransportFactory {
    async fn create(
        &self,
        destination: &DestinationSpec,
    ) -> Result<Arc<dyn DestinationTransport>, FerryError> {
        ferry_transport::create_transport(destination)
            .map_err(|e| FerryError::Validation(e.to_string()))
    }
}

/// Collaborator handles carried through one run.
#[derive(Default)]
struct RunContext {
    transport: Option<Arc<dyn DestinationTransport>>,
    remote_path: Option<String>,
}

pub struct TransferOrchestrator {
    config: FerryConfig,
    broker: Arc<SessionBroker>,
    engine: Arc<TransferEngine>,
    records: TransferRecordStore,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    sources: Arc<dyn SourceFactory>,
    transports: Arc<dyn TransportFactory>,
    retry: RetryPolicy,
}

impl TransferOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FerryConfig,
        store: Arc<dyn KeyValueStore>,
        broker: Arc<SessionBroker>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        sources: Arc<dyn SourceFactory>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        let records = TransferRecordStore::new(store, config.record_retention());
        let engine = Arc::new(TransferEngine::new(EngineConfig::from_ferry(&config)));
        let retry = RetryPolicy {
            max_retries: config.transfer_max_attempts,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        };
        TransferOrchestrator {
            config,
            broker,
            engine,
            records,
            audit,
            notifier,
            sources,
            transports,
            retry,
        }
    }

    /// Accept a transfer request and drive it to a terminal state.
    ///
    /// Validation failures reject synchronously with `Err`; every accepted
    /// request returns a terminal [`TransferRecord`] whose `state` is
    /// `Completed` or `Failed`.
    pub async fn submit(&self, request: TransferRequest) -> Result<TransferRecord, FerryError> {
        request.check()?;

        let mut record = TransferRecord::new(
            &request.subject,
            &request.approval_reference,
            request.plan.clone(),
        );
        record.checksum_expected = request.plan.checksum_expected.clone();
        self.records.save(&record).await?;

        tracing::info!(
            transfer_id = %record.id,
            subject = %record.subject,
            approval_reference = %record.approval_reference,
            "Transfer accepted"
        );

        self.run(&mut record).await;
        Ok(record)
    }

    /// Look up a transfer record; the destination password is masked.
    pub async fn record(&self, id: Uuid) -> Result<Option<TransferRecord>, FerryError> {
        self.records.get(id).await
    }

    async fn run(&self, record: &mut TransferRecord) {
        let mut ctx = RunContext::default();
        let result = self.execute_core(record, &mut ctx).await;

        if let Err(ref e) = result {
            tracing::error!(
                transfer_id = %record.id,
                state = %record.state,
                error_kind = e.kind(),
                error = %e,
                "Transfer pipeline failed"
            );
            // Pick up whatever progress the writer task persisted.
            if let Ok(Some(stored)) = self.records.get(record.id).await {
                record.bytes_transferred = stored.bytes_transferred;
            }
        }

        if let Err(e) = self.transition(record, TransferState::Recording).await {
            tracing::warn!(transfer_id = %record.id, error = %e, "Recording transition not persisted");
        }
        self.record_outcome(record, &result).await;

        if let Err(e) = self.transition(record, TransferState::Notifying).await {
            tracing::warn!(transfer_id = %record.id, error = %e, "Notifying transition not persisted");
        }
        self.send_notification(record, &result).await;

        if let Err(e) = self.transition(record, TransferState::CleaningUp).await {
            tracing::warn!(transfer_id = %record.id, error = %e, "CleaningUp transition not persisted");
        }
        self.cleanup(record, &ctx, result.is_err()).await;

        record.completed_at = Some(Utc::now());
        match result {
            Ok(()) => {
                record.state = TransferState::Completed;
            }
            Err(e) => {
                record.error = Some(RecordedError {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    attempts: record.attempt_count,
                });
                record.state = TransferState::Failed;
            }
        }
        if let Err(e) = self.records.save(record).await {
            tracing::error!(transfer_id = %record.id, error = %e, "Terminal record not persisted");
        }

        tracing::info!(
            transfer_id = %record.id,
            state = %record.state,
            bytes_transferred = record.bytes_transferred,
            attempts = record.attempt_count,
            degraded = record.degraded,
            "Transfer finished"
        );
    }

    async fn execute_core(
        &self,
        record: &mut TransferRecord,
        ctx: &mut RunContext,
    ) -> Result<(), FerryError> {
        // Authenticating
        self.transition(record, TransferState::Authenticating).await?;
        let session = self.authenticate_with_retry(record).await?;
        record.session_token = Some(session.token);
        self.records.save(record).await?;

        // Planning
        self.transition(record, TransferState::Planning).await?;
        let (source, transport, strategy) = self.plan(record, &session, ctx).await?;

        // Transferring (with bounded re-entry through Retrying)
        let outcome = self
            .transfer_with_retry(record, &source, &transport, strategy)
            .await?;
        record.bytes_transferred = outcome.bytes_transferred;
        record.checksum_actual = Some(outcome.checksum.clone());
        self.records.save(record).await?;

        // Verifying
        self.transition(record, TransferState::Verifying).await?;
        self.verify(record, &source).await?;

        Ok(())
    }

    async fn authenticate_with_retry(
        &self,
        record: &TransferRecord,
    ) -> Result<Session, FerryError> {
        let mut retries = 0u32;
        loop {
            let attempt = tokio::time::timeout(
                self.config.auth_timeout(),
                self.broker
                    .authenticate(&record.subject, &record.approval_reference, &record.plan),
            )
            .await;

            let err = match attempt {
                Ok(Ok(session)) => return Ok(session),
                Ok(Err(e)) => e,
                Err(_) => {
                    FerryError::TransientInfrastructure("identity provider timed out".to_string())
                }
            };

            if !err.is_retryable() || retries >= self.config.auth_max_retries {
                return Err(err);
            }
            let delay = self.retry.backoff_delay(retries);
            retries += 1;
            tracing::warn!(
                transfer_id = %record.id,
                retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Authentication failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Build collaborators, redeem the session, inspect the source, and pick
    /// a strategy. The transport is built before the session is consumed so a
    /// misconfigured destination does not burn the single-use authorization.
    async fn plan(
        &self,
        record: &mut TransferRecord,
        session: &Session,
        ctx: &mut RunContext,
    ) -> Result<(Arc<dyn ObjectSource>, Arc<dyn DestinationTransport>, TransferStrategy), FerryError>
    {
        let transport = self.transports.create(&record.plan.destination).await?;
        ctx.transport = Some(Arc::clone(&transport));
        ctx.remote_path = Some(record.plan.remote_object_path());

        // Single-use redemption; expiry before this point abandons the attempt.
        let credentials = self.broker.consume(session.token).await?;

        let source = self
            .sources
            .create(&record.plan.source.container, &credentials)
            .await?;

        let stat = match source.stat(&record.plan.source.object_key).await {
            Ok(stat) => stat,
            Err(SourceError::NotFound(key)) => {
                return Err(FerryError::Validation(format!(
                    "source object {} does not exist",
                    key
                )));
            }
            Err(e) => return Err(FerryError::TransientInfrastructure(e.to_string())),
        };
        record.bytes_total = stat.size;

        let mut strategy = TransferStrategy::select(
            stat.size,
            self.config.small_object_threshold_bytes,
            self.config.large_object_threshold_bytes,
        );
        if strategy == TransferStrategy::ParallelChunked
            && !transport.capabilities().random_write
        {
            tracing::warn!(
                transfer_id = %record.id,
                scheme = transport.scheme(),
                "Destination lacks random-offset writes, downgrading to chunked"
            );
            strategy = TransferStrategy::Chunked;
        }
        record.strategy = Some(strategy);
        self.records.save(record).await?;

        tracing::info!(
            transfer_id = %record.id,
            bytes_total = stat.size,
            strategy = %strategy,
            chunks = partition(stat.size, self.config.chunk_size_bytes).len(),
            scheme = transport.scheme(),
            "Transfer planned"
        );

        Ok((source, transport, strategy))
    }

    async fn transfer_with_retry(
        &self,
        record: &mut TransferRecord,
        source: &Arc<dyn ObjectSource>,
        transport: &Arc<dyn DestinationTransport>,
        strategy: TransferStrategy,
    ) -> Result<TransferOutcome, FerryError> {
        let spec = TransferSpec {
            object_key: record.plan.source.object_key.clone(),
            remote_path: record.plan.remote_object_path(),
            bytes_total: record.bytes_total,
        };

        loop {
            if record.attempt_count > 0 {
                self.transition(record, TransferState::Retrying).await?;
                let delay = self.retry.backoff_delay(record.attempt_count - 1);
                tokio::time::sleep(delay).await;
            }
            record.attempt_count += 1;
            self.transition(record, TransferState::Transferring).await?;

            // Progress flows through a channel into a writer task: the engine
            // reports, only the orchestrator touches the store.
            let (tx, rx) = mpsc::unbounded_channel();
            let writer = tokio::spawn(progress_writer(
                self.records.clone(),
                record.id,
                rx,
                self.config.progress_write_interval_bytes,
            ));
            let progress: ProgressCallback = Arc::new(move |update| {
                let _ = tx.send(update);
            });

            let result = tokio::time::timeout(
                self.config.transfer_timeout(),
                self.engine.transfer(
                    Arc::clone(source),
                    Arc::clone(transport),
                    &spec,
                    strategy,
                    progress,
                ),
            )
            .await;
            let _ = writer.await;

            let err = match result {
                Ok(Ok(outcome)) => return Ok(outcome),
                Ok(Err(e)) => e,
                Err(_) => {
                    EngineError::DestinationUnreachable("transfer phase timed out".to_string())
                }
            };

            if !err.is_transient() || record.attempt_count >= self.config.transfer_max_attempts {
                return Err(FerryError::Transfer {
                    message: err.to_string(),
                    attempts: record.attempt_count,
                });
            }
            tracing::warn!(
                transfer_id = %record.id,
                attempt = record.attempt_count,
                error = %err,
                "Transfer attempt failed, will retry"
            );
        }
    }

    async fn verify(
        &self,
        record: &mut TransferRecord,
        source: &Arc<dyn ObjectSource>,
    ) -> Result<(), FerryError> {
        let actual = record.checksum_actual.clone().ok_or_else(|| {
            FerryError::Transfer {
                message: "no checksum was computed during transfer".to_string(),
                attempts: record.attempt_count,
            }
        })?;

        let expected = match record.checksum_expected.clone() {
            Some(expected) => expected,
            None => {
                let computed = tokio::time::timeout(
                    self.config.verify_timeout(),
                    self.engine
                        .source_checksum(source, &record.plan.source.object_key),
                )
                .await
                .map_err(|_| {
                    FerryError::TransientInfrastructure("verification timed out".to_string())
                })?
                .map_err(|e| FerryError::TransientInfrastructure(e.to_string()))?;
                record.checksum_expected = Some(computed.clone());
                self.records.save(record).await?;
                computed
            }
        };

        if expected != actual {
            return Err(FerryError::Integrity { expected, actual });
        }

        tracing::info!(
            transfer_id = %record.id,
            checksum = %actual,
            "Integrity verified"
        );
        Ok(())
    }

    async fn record_outcome(&self, record: &mut TransferRecord, result: &Result<(), FerryError>) {
        let (outcome, detail) = match result {
            Ok(()) => (
                "completed".to_string(),
                format!("{} bytes transferred", record.bytes_transferred),
            ),
            Err(e) => ("failed".to_string(), format!("{}: {}", e.kind(), e)),
        };

        let report = OutcomeReport {
            transfer_id: record.id,
            subject: record.subject.clone(),
            outcome,
            detail,
            bytes_transferred: record.bytes_transferred,
            checksum: record.checksum_actual.clone(),
            attempts: record.attempt_count,
        };

        match self.audit.record_outcome(&report).await {
            Ok(ticket) => {
                record.ticket_ref = Some(ticket);
            }
            Err(e) => {
                // Never rolls back a successful transfer; reported as
                // degraded success instead.
                tracing::warn!(
                    transfer_id = %record.id,
                    error = %e,
                    "Audit recording failed"
                );
                if result.is_ok() {
                    record.degraded = true;
                }
            }
        }

        if let Err(e) = self.records.save(record).await {
            tracing::warn!(transfer_id = %record.id, error = %e, "Record update failed");
        }
    }

    async fn send_notification(&self, record: &TransferRecord, result: &Result<(), FerryError>) {
        let outcome = if result.is_ok() { "completed" } else { "failed" };
        if let Err(e) = self
            .notifier
            .notify(&record.subject, record.id, outcome)
            .await
        {
            tracing::warn!(transfer_id = %record.id, error = %e, "Notification failed");
        }
    }

    async fn cleanup(&self, record: &TransferRecord, ctx: &RunContext, failed: bool) {
        if let Some(token) = record.session_token {
            if let Err(e) = self.broker.invalidate(token).await {
                tracing::warn!(transfer_id = %record.id, error = %e, "Session invalidation failed");
            }
        }

        if let (Some(transport), Some(remote_path)) = (&ctx.transport, &ctx.remote_path) {
            if failed && self.config.cleanup_partial_on_failure {
                match transport.committed_size(remote_path).await {
                    Ok(Some(committed)) if committed > 0 => {
                        if let Err(e) = transport.remove(remote_path).await {
                            tracing::warn!(
                                transfer_id = %record.id,
                                remote_path = %remote_path,
                                error = %e,
                                "Partial object removal failed"
                            );
                        } else {
                            tracing::info!(
                                transfer_id = %record.id,
                                remote_path = %remote_path,
                                committed,
                                "Partial object removed"
                            );
                        }
                    }
                    _ => {}
                }
            }
            let _ = transport.close().await;
        }
    }

    async fn transition(
        &self,
        record: &mut TransferRecord,
        state: TransferState,
    ) -> Result<(), FerryError> {
        record.state = state;
        self.records.save(record).await?;
        tracing::debug!(transfer_id = %record.id, state = %state, "State transition");
        Ok(())
    }
}

/// Drains progress updates into the store, throttled to roughly one write
/// per `every_bytes` of progress plus the final total.
async fn progress_writer(
    records: TransferRecordStore,
    transfer_id: Uuid,
    mut rx: mpsc::UnboundedReceiver<ProgressUpdate>,
    every_bytes: u64,
) {
    let mut last_written: u64 = 0;
    while let Some(update) = rx.recv().await {
        let due = update.bytes_transferred >= update.bytes_total
            || update.bytes_transferred.saturating_sub(last_written) >= every_bytes.max(1);
        if due {
            last_written = update.bytes_transferred;
            if let Err(e) = records
                .set_progress(transfer_id, update.bytes_transferred)
                .await
            {
                tracing::warn!(
                    transfer_id = %transfer_id,
                    error = %e,
                    "Progress write failed"
                );
            }
        }
    }
}
