//! End-to-end engine tests against the local source and destination
//! backends, with a fault-injecting wrapper for failure paths.

use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::TransferStrategy;
use ferry_engine::{noop_progress, EngineConfig, EngineError, RetryPolicy, TransferEngine, TransferSpec};
use ferry_storage::{LocalObjectSource, ObjectSource};
use ferry_transport::{
    DestinationTransport, LocalDestination, TransportCapabilities, TransportError, TransportResult,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 239) as u8).collect()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn engine_with_chunk_size(chunk_size: u64) -> TransferEngine {
    TransferEngine::new(EngineConfig {
        buffer_size: chunk_size as usize,
        chunk_size,
        max_workers: 5,
        retry: fast_retry(),
    })
}

async fn fixture(data: &[u8]) -> (TempDir, TempDir, Arc<dyn ObjectSource>, Arc<LocalDestination>) {
    let source_dir = TempDir::new().unwrap();
    let dest_dir = TempDir::new().unwrap();

    tokio::fs::write(source_dir.path().join("object.bin"), data)
        .await
        .unwrap();

    let source: Arc<dyn ObjectSource> =
        Arc::new(LocalObjectSource::new(source_dir.path()).await.unwrap());
    let destination = Arc::new(LocalDestination::new(dest_dir.path()).await.unwrap());

    (source_dir, dest_dir, source, destination)
}

fn spec(len: u64) -> TransferSpec {
    TransferSpec {
        object_key: "object.bin".to_string(),
        remote_path: "/incoming/object.bin".to_string(),
        bytes_total: len,
    }
}

/// Wrapper that injects failures into `write_chunk`.
struct FaultyDestination {
    inner: Arc<LocalDestination>,
    write_calls: AtomicU32,
    failures: u32,
    reject_auth: bool,
    random_write: bool,
}

impl FaultyDestination {
    fn flaky(inner: Arc<LocalDestination>, failures: u32) -> Self {
        FaultyDestination {
            inner,
            write_calls: AtomicU32::new(0),
            failures,
            reject_auth: false,
            random_write: true,
        }
    }

    fn rejecting(inner: Arc<LocalDestination>) -> Self {
        FaultyDestination {
            inner,
            write_calls: AtomicU32::new(0),
            failures: 0,
            reject_auth: true,
            random_write: true,
        }
    }

    fn append_only(inner: Arc<LocalDestination>) -> Self {
        FaultyDestination {
            inner,
            write_calls: AtomicU32::new(0),
            failures: 0,
            reject_auth: false,
            random_write: false,
        }
    }
}

#[async_trait]
impl DestinationTransport for FaultyDestination {
    fn scheme(&self) -> &'static str {
        "faulty"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            resume: true,
            random_write: self.random_write,
        }
    }

    async fn verify_auth(&self) -> TransportResult<()> {
        self.inner.verify_auth().await
    }

    async fn committed_size(&self, remote_path: &str) -> TransportResult<Option<u64>> {
        self.inner.committed_size(remote_path).await
    }

    async fn truncate(&self, remote_path: &str) -> TransportResult<()> {
        self.inner.truncate(remote_path).await
    }

    async fn write_chunk(
        &self,
        remote_path: &str,
        offset: u64,
        data: Bytes,
    ) -> TransportResult<()> {
        let call = self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_auth {
            return Err(TransportError::AuthRejected("530 not logged in".to_string()));
        }
        if call < self.failures {
            return Err(TransportError::Unreachable("connection reset".to_string()));
        }
        self.inner.write_chunk(remote_path, offset, data).await
    }

    async fn remove(&self, remote_path: &str) -> TransportResult<()> {
        self.inner.remove(remote_path).await
    }

    async fn close(&self) -> TransportResult<()> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn direct_round_trip() {
    let data = content(100_000);
    let (_s, dest_dir, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(16 * 1024);

    let outcome = engine
        .transfer(
            source.clone(),
            destination,
            &spec(data.len() as u64),
            TransferStrategy::Direct,
            noop_progress(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes_transferred, data.len() as u64);
    let written = tokio::fs::read(dest_dir.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert_eq!(written, data);

    let expected = engine.source_checksum(&source, "object.bin").await.unwrap();
    assert_eq!(outcome.checksum, expected);
}

#[tokio::test]
async fn direct_transfer_of_empty_object() {
    let (_s, dest_dir, source, destination) = fixture(&[]).await;
    let engine = engine_with_chunk_size(1024);

    let outcome = engine
        .transfer(
            source,
            destination,
            &spec(0),
            TransferStrategy::Direct,
            noop_progress(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes_transferred, 0);
    let written = tokio::fs::read(dest_dir.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert!(written.is_empty());
}

#[tokio::test]
async fn chunked_round_trip_counts_chunks() {
    let data = content(50_000);
    let (_s, dest_dir, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(8 * 1024);

    let outcome = engine
        .transfer(
            source,
            destination,
            &spec(data.len() as u64),
            TransferStrategy::Chunked,
            noop_progress(),
        )
        .await
        .unwrap();

    // ceil(50000 / 8192) chunks
    assert_eq!(outcome.chunks_completed, 7);
    assert_eq!(outcome.bytes_transferred, data.len() as u64);
    let written = tokio::fs::read(dest_dir.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert_eq!(written, data);
}

#[tokio::test]
async fn parallel_checksum_equals_direct_checksum() {
    let data = content(64_000);
    let chunk_size = 7 * 1024;

    let (_s1, dest_dir_a, source_a, destination_a) = fixture(&data).await;
    let engine = engine_with_chunk_size(chunk_size);
    let parallel = engine
        .transfer(
            source_a,
            destination_a,
            &spec(data.len() as u64),
            TransferStrategy::ParallelChunked,
            noop_progress(),
        )
        .await
        .unwrap();

    let (_s2, dest_dir_b, source_b, destination_b) = fixture(&data).await;
    let direct = engine
        .transfer(
            source_b,
            destination_b,
            &spec(data.len() as u64),
            TransferStrategy::Direct,
            noop_progress(),
        )
        .await
        .unwrap();

    assert_eq!(parallel.checksum, direct.checksum);
    assert_eq!(parallel.bytes_transferred, direct.bytes_transferred);
    // ceil(64000 / 7168) chunks all acknowledged
    assert_eq!(parallel.chunks_completed, 9);

    let written_a = tokio::fs::read(dest_dir_a.path().join("incoming/object.bin"))
        .await
        .unwrap();
    let written_b = tokio::fs::read(dest_dir_b.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert_eq!(written_a, data);
    assert_eq!(written_b, data);
}

#[tokio::test]
async fn parallel_requires_random_write() {
    let data = content(10_000);
    let (_s, _d, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(1024);

    let err = engine
        .transfer(
            source,
            Arc::new(FaultyDestination::append_only(destination)),
            &spec(data.len() as u64),
            TransferStrategy::ParallelChunked,
            noop_progress(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DestinationUnreachable(_)));
}

#[tokio::test]
async fn chunked_retries_transient_write_failures() {
    let data = content(30_000);
    let (_s, dest_dir, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(8 * 1024);

    let faulty = Arc::new(FaultyDestination::flaky(destination, 2));
    let outcome = engine
        .transfer(
            source,
            faulty.clone(),
            &spec(data.len() as u64),
            TransferStrategy::Chunked,
            noop_progress(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes_transferred, data.len() as u64);
    assert!(faulty.write_calls.load(Ordering::SeqCst) > 2);
    let written = tokio::fs::read(dest_dir.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert_eq!(written, data);
}

#[tokio::test]
async fn auth_rejection_surfaces_without_retry() {
    let data = content(10_000);
    let (_s, _d, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(4 * 1024);

    let faulty = Arc::new(FaultyDestination::rejecting(destination));
    let err = engine
        .transfer(
            source,
            faulty.clone(),
            &spec(data.len() as u64),
            TransferStrategy::Chunked,
            noop_progress(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::AuthenticationRejected(_)));
    assert!(!err.is_transient());
    assert_eq!(faulty.write_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chunked_resumes_from_committed_offset() {
    let data = content(40_000);
    let (_s, dest_dir, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(8 * 1024);

    // A previous attempt acknowledged the first 10_000 bytes.
    destination
        .write_chunk(
            "/incoming/object.bin",
            0,
            Bytes::copy_from_slice(&data[..10_000]),
        )
        .await
        .unwrap();

    let outcome = engine
        .transfer(
            source.clone(),
            destination,
            &spec(data.len() as u64),
            TransferStrategy::Chunked,
            noop_progress(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes_transferred, data.len() as u64);
    let written = tokio::fs::read(dest_dir.path().join("incoming/object.bin"))
        .await
        .unwrap();
    assert_eq!(written, data);

    // The resumed run's checksum still covers every byte.
    let expected = engine.source_checksum(&source, "object.bin").await.unwrap();
    assert_eq!(outcome.checksum, expected);
}

#[tokio::test]
async fn progress_reaches_the_total() {
    let data = content(20_000);
    let (_s, _d, source, destination) = fixture(&data).await;
    let engine = engine_with_chunk_size(4 * 1024);

    let last_seen = Arc::new(AtomicU32::new(0));
    let watcher = last_seen.clone();
    let progress: ferry_engine::ProgressCallback = Arc::new(move |update| {
        watcher.store(update.bytes_transferred as u32, Ordering::SeqCst);
    });

    engine
        .transfer(
            source,
            destination,
            &spec(data.len() as u64),
            TransferStrategy::Chunked,
            progress,
        )
        .await
        .unwrap();

    assert_eq!(last_seen.load(Ordering::SeqCst) as usize, data.len());
}
