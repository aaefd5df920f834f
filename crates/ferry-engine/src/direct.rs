//! Direct strategy: one read stream, one write stream, fixed-size buffers,
//! no chunk accounting. Failures surface to the orchestrator for a
//! whole-phase retry.

use bytes::BytesMut;
use ferry_storage::ObjectSource;
use ferry_transport::DestinationTransport;
use futures::StreamExt;
use std::sync::Arc;

use crate::checksum::ChunkedSha256;
use crate::engine::{EngineConfig, TransferOutcome, TransferSpec};
use crate::error::{from_source, from_transport, EngineError};
use crate::progress::{ProgressCallback, ProgressUpdate};

pub(crate) async fn run(
    source: &Arc<dyn ObjectSource>,
    destination: &Arc<dyn DestinationTransport>,
    spec: &TransferSpec,
    config: &EngineConfig,
    progress: &ProgressCallback,
) -> Result<TransferOutcome, EngineError> {
    destination
        .truncate(&spec.remote_path)
        .await
        .map_err(from_transport)?;

    let mut stream = source
        .read_stream(&spec.object_key)
        .await
        .map_err(from_source)?;

    let mut hasher = ChunkedSha256::new(config.chunk_size);
    let mut buffer = BytesMut::with_capacity(config.buffer_size);
    let mut offset: u64 = 0;

    while let Some(piece) = stream.next().await {
        let piece = piece.map_err(from_source)?;
        hasher.update(&piece);
        buffer.extend_from_slice(&piece);

        if buffer.len() >= config.buffer_size {
            let data = buffer.split().freeze();
            let len = data.len() as u64;
            destination
                .write_chunk(&spec.remote_path, offset, data)
                .await
                .map_err(from_transport)?;
            offset += len;
            (progress)(ProgressUpdate {
                bytes_transferred: offset,
                bytes_total: spec.bytes_total,
            });
        }
    }

    if !buffer.is_empty() {
        let data = buffer.split().freeze();
        let len = data.len() as u64;
        destination
            .write_chunk(&spec.remote_path, offset, data)
            .await
            .map_err(from_transport)?;
        offset += len;
        (progress)(ProgressUpdate {
            bytes_transferred: offset,
            bytes_total: spec.bytes_total,
        });
    }

    if offset != spec.bytes_total {
        tracing::warn!(
            object_key = %spec.object_key,
            expected = spec.bytes_total,
            actual = offset,
            "Source yielded a different byte count than planned"
        );
    }

    Ok(TransferOutcome {
        bytes_transferred: offset,
        checksum: hasher.finalize(),
        chunks_completed: 0,
    })
}
