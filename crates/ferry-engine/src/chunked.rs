//! Chunked strategy: sequential fixed-size chunks with chunk-level retry.
//! On destinations that expose append semantics, an interrupted transfer
//! resumes from the last acknowledged offset instead of byte zero.

use ferry_storage::ObjectSource;
use ferry_transport::DestinationTransport;
use std::sync::Arc;

use crate::checksum::ChunkedSha256;
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
    let chunks = partition(spec.bytes_total, config.chunk_size);
    let caps = destination.capabilities();

    // Acknowledged bytes from a previous attempt, when the protocol lets us
    // continue mid-object.
    let committed = if caps.resume {
        destination
            .committed_size(&spec.remote_path)
            .await
            .unwrap_or(None)
            .unwrap_or(0)
            .min(spec.bytes_total)
    } else {
        0
    };

    if committed == 0 {
        destination
            .truncate(&spec.remote_path)
            .await
            .map_err(from_transport)?;
    } else {
        tracing::info!(
            remote_path = %spec.remote_path,
            committed,
            "Resuming from acknowledged offset"
        );
    }

    let mut hasher = ChunkedSha256::new(config.chunk_size);
    let mut transferred: u64 = 0;
    let mut completed: u32 = 0;

    for chunk in &chunks {
        // Every chunk is read and hashed; acknowledged chunks skip the write.
        let data = read_chunk_with_retry(source, &spec.object_key, chunk, &config.retry).await?;
        hasher.update(&data);

        if chunk.end() <= committed {
            // Already acknowledged by a previous attempt.
        } else if chunk.offset < committed {
            let skip = (committed - chunk.offset) as usize;
            write_chunk_with_retry(
                destination,
                &spec.remote_path,
                committed,
                data.slice(skip..),
                true,
                &config.retry,
            )
            .await?;
        } else {
            write_chunk_with_retry(
                destination,
                &spec.remote_path,
                chunk.offset,
                data,
                true,
                &config.retry,
            )
            .await?;
        }

        transferred = chunk.end();
        completed += 1;
        (progress)(ProgressUpdate {
            bytes_transferred: transferred,
            bytes_total: spec.bytes_total,
        });
    }

    Ok(TransferOutcome {
        bytes_transferred: transferred,
        checksum: hasher.finalize(),
        chunks_completed: completed,
    })
}
