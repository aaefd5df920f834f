//! Engine entry point and shared chunk helpers

use bytes::Bytes;
use ferry_core::{FerryConfig, TransferStrategy};
use ferry_storage::{ObjectSource, SourceError};
use ferry_transport::DestinationTransport;
use futures::StreamExt;
use std::sync::Arc;

use crate::checksum::ChunkedSha256;
use crate::chunks::Chunk;
use crate::error::{from_source, from_transport, EngineError};
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use crate::{chunked, direct, parallel};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Copy buffer for the direct strategy.
    pub buffer_size: usize,
    /// Fixed chunk size for chunk accounting and checksum segmentation.
    pub chunk_size: u64,
    /// Worker bound for the parallel-chunked strategy.
    pub max_workers: usize,
    /// Chunk-level retry budget.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            buffer_size: 10 * 1024 * 1024,
            chunk_size: 10 * 1024 * 1024,
            max_workers: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_ferry(config: &FerryConfig) -> Self {
        EngineConfig {
            buffer_size: config.chunk_size_bytes as usize,
            chunk_size: config.chunk_size_bytes,
            max_workers: config.max_parallel_workers,
            retry: RetryPolicy {
                max_retries: config.chunk_max_retries,
                base_delay: config.retry_base_delay(),
                max_delay: config.retry_max_delay(),
            },
        }
    }
}

/// What to move and where to put it. The engine receives already-validated
/// values; object existence was established during planning.
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub object_key: String,
    pub remote_path: String,
    pub bytes_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub bytes_transferred: u64,
    pub checksum: String,
    pub chunks_completed: u32,
}

pub struct TransferEngine {
    config: EngineConfig,
}

impl TransferEngine {
    pub fn new(config: EngineConfig) -> Self {
        TransferEngine { config }
    }

    /// Execute one transfer under the given strategy.
    pub async fn transfer(
        &self,
        source: Arc<dyn ObjectSource>,
        destination: Arc<dyn DestinationTransport>,
        spec: &TransferSpec,
        strategy: TransferStrategy,
        progress: ProgressCallback,
    ) -> Result<TransferOutcome, EngineError> {
        let start = std::time::Instant::now();
        tracing::info!(
            object_key = %spec.object_key,
            remote_path = %spec.remote_path,
            bytes_total = spec.bytes_total,
            strategy = %strategy,
            scheme = destination.scheme(),
            "Transfer started"
        );

        let result = match strategy {
            TransferStrategy::Direct => {
                direct::run(&source, &destination, spec, &self.config, &progress).await
            }
            TransferStrategy::Chunked => {
                chunked::run(&source, &destination, spec, &self.config, &progress).await
            }
            TransferStrategy::ParallelChunked => {
                parallel::run(&source, &destination, spec, &self.config, &progress).await
            }
        };

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    object_key = %spec.object_key,
                    bytes_transferred = outcome.bytes_transferred,
                    chunks_completed = outcome.chunks_completed,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Transfer finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    object_key = %spec.object_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Transfer failed"
                );
            }
        }

        result
    }

    /// Recompute the source object's checksum with the engine's chunk size,
    /// for verification when the plan did not supply one.
    pub async fn source_checksum(
        &self,
        source: &Arc<dyn ObjectSource>,
        object_key: &str,
    ) -> Result<String, EngineError> {
        let mut stream = source.read_stream(object_key).await.map_err(from_source)?;
        let mut hasher = ChunkedSha256::new(self.config.chunk_size);
        while let Some(piece) = stream.next().await {
            hasher.update(&piece.map_err(from_source)?);
        }
        Ok(hasher.finalize())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Read one chunk's byte range, retrying transient source failures.
pub(crate) async fn read_chunk_with_retry(
    source: &Arc<dyn ObjectSource>,
    object_key: &str,
    chunk: &Chunk,
    retry: &RetryPolicy,
) -> Result<Bytes, EngineError> {
    let mut attempt = 0u32;
    loop {
        match source.read_range(object_key, chunk.range()).await {
            Ok(data) => return Ok(data),
            Err(SourceError::ReadFailed(msg)) if attempt < retry.max_retries => {
                let delay = retry.backoff_delay(attempt);
                attempt += 1;
                tracing::warn!(
                    object_key = %object_key,
                    chunk_index = chunk.index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %msg,
                    "Chunk read failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(from_source(e)),
        }
    }
}

/// Write one chunk, retrying transient destination failures with backoff.
///
/// When `sequential` is set and the destination supports resume, each retry
/// re-probes the committed size and continues from the acknowledged offset
/// instead of resending bytes the destination already holds.
pub(crate) async fn write_chunk_with_retry(
    destination: &Arc<dyn DestinationTransport>,
    remote_path: &str,
    chunk_offset: u64,
    data: Bytes,
    sequential: bool,
    retry: &RetryPolicy,
) -> Result<(), EngineError> {
    let resume = sequential && destination.capabilities().resume;
    let mut attempt = 0u32;
    let mut offset = chunk_offset;
    let mut pending = data;

    loop {
        match destination
            .write_chunk(remote_path, offset, pending.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.backoff_delay(attempt);
                attempt += 1;
                tracing::warn!(
                    remote_path = %remote_path,
                    offset,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Chunk write failed, retrying"
                );
                tokio::time::sleep(delay).await;

                if resume {
                    if let Ok(Some(committed)) = destination.committed_size(remote_path).await {
                        if committed >= offset + pending.len() as u64 {
                            // Fully acknowledged before the connection dropped.
                            return Ok(());
                        }
                        if committed > offset {
                            pending = pending.slice((committed - offset) as usize..);
                            offset = committed;
                        }
                    }
                }
            }
            Err(e) => return Err(from_transport(e)),
        }
    }
}
