//! Parallel-chunked strategy: a bounded worker pool where each worker
//! independently range-reads one chunk and writes it at its offset. The
//! strategy completes only when every chunk acknowledges; the first chunk to
//! exhaust its retry budget aborts the rest. No partial silent success.

use ferry_storage::ObjectSource;
use ferry_transport::DestinationTransport;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::checksum::{combine_digests, digest_chunk};
use crate::chunks::partition;
use crate::engine::{
    read_chunk_with_retry, write_chunk_with_retry, EngineConfig, TransferOutcome, TransferSpec,
};
use crate::error::{from_transport, EngineError};
use crate::progress::{ProgressCallback, ProgressUpdate};

pub(crate) async fn run(
    source: &Arc<dyn ObjectSource>,
    destination: &Arc<dyn DestinationTransport>,
    spec: &TransferSpec,
    config: &EngineConfig,
    progress: &ProgressCallback,
) -> Result<TransferOutcome, EngineError> {
    if !destination.capabilities().random_write {
        return Err(EngineError::DestinationUnreachable(format!(
            "{} destination does not support random-offset writes",
            destination.scheme()
        )));
    }

    let chunks = partition(spec.bytes_total, config.chunk_size);

    destination
        .truncate(&spec.remote_path)
        .await
        .map_err(from_transport)?;

    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut join_set: JoinSet<Result<(u32, [u8; 32], u64), EngineError>> = JoinSet::new();

    for chunk in &chunks {
        let chunk = *chunk;
        let semaphore = Arc::clone(&semaphore);
        let source = Arc::clone(source);
        let destination = Arc::clone(destination);
        let object_key = spec.object_key.clone();
        let remote_path = spec.remote_path.clone();
        let retry = config.retry.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| {
                EngineError::DestinationUnreachable("worker pool closed".to_string())
            })?;

            let data = read_chunk_with_retry(&source, &object_key, &chunk, &retry).await?;
            let digest = digest_chunk(&data);
            write_chunk_with_retry(&destination, &remote_path, chunk.offset, data, false, &retry)
                .await?;

            Ok((chunk.index, digest, chunk.length))
        });
    }

    let mut digests: Vec<Option<[u8; 32]>> = vec![None; chunks.len()];
    let mut bytes_transferred: u64 = 0;
    let mut completed: u32 = 0;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok((index, digest, length))) => {
                digests[index as usize] = Some(digest);
                bytes_transferred += length;
                completed += 1;
                (progress)(ProgressUpdate {
                    bytes_transferred,
                    bytes_total: spec.bytes_total,
                });
            }
            Ok(Err(e)) => {
                tracing::error!(
                    error = %e,
                    chunks_completed = completed,
                    chunks_total = chunks.len(),
                    "Chunk exhausted its retry budget, aborting remaining workers"
                );
                join_set.abort_all();
                return Err(e);
            }
            Err(join_err) => {
                if join_err.is_cancelled() {
                    continue;
                }
                join_set.abort_all();
                return Err(EngineError::DestinationUnreachable(format!(
                    "chunk worker panicked: {}",
                    join_err
                )));
            }
        }
    }

    // Combine in chunk order so the checksum is independent of worker
    // scheduling.
    let ordered: Option<Vec<[u8; 32]>> = digests.into_iter().collect();
    let Some(ordered) = ordered else {
        return Err(EngineError::ChecksumUnavailable(
            "not every chunk produced a digest".to_string(),
        ));
    };

    Ok(TransferOutcome {
        bytes_transferred,
        checksum: combine_digests(&ordered),
        chunks_completed: completed,
    })
}
