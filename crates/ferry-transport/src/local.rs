use crate::traits::{DestinationTransport, TransportCapabilities, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Local filesystem destination
///
/// Full seek semantics, so every strategy runs against it. Used for
/// development and as the reference backend in tests.
#[derive(Clone)]
pub struct LocalDestination {
    root: PathBuf,
}

impl LocalDestination {
    pub async fn new(root: impl Into<PathBuf>) -> TransportResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            TransportError::Config(format!(
                "Failed to create destination directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(LocalDestination { root })
    }

    fn remote_to_path(&self, remote_path: &str) -> TransportResult<PathBuf> {
        let relative = remote_path.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|seg| seg == "..") {
            return Err(TransportError::Config(format!(
                "Remote path {} is not a valid destination path",
                remote_path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DestinationTransport for LocalDestination {
    fn scheme(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            resume: true,
            random_write: true,
        }
    }

    async fn verify_auth(&self) -> TransportResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))
    }

    async fn committed_size(&self, remote_path: &str) -> TransportResult<Option<u64>> {
        let path = self.remote_to_path(remote_path)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    async fn truncate(&self, remote_path: &str) -> TransportResult<()> {
        let path = self.remote_to_path(remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }
        fs::File::create(&path)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }

    async fn write_chunk(
        &self,
        remote_path: &str,
        offset: u64,
        data: Bytes,
    ) -> TransportResult<()> {
        let path = self.remote_to_path(remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }

        file.write_all(&data)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, remote_path: &str) -> TransportResult<()> {
        let path = self.remote_to_path(remote_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sequential_writes_assemble_the_object() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path()).await.unwrap();

        dest.write_chunk("/incoming/out.bin", 0, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        dest.write_chunk("/incoming/out.bin", 6, Bytes::from_static(b"world"))
            .await
            .unwrap();

        let written = fs::read(dir.path().join("incoming/out.bin")).await.unwrap();
        assert_eq!(written, b"hello world");
        assert_eq!(
            dest.committed_size("/incoming/out.bin").await.unwrap(),
            Some(11)
        );
    }

    #[tokio::test]
    async fn truncate_discards_previous_content() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path()).await.unwrap();

        dest.write_chunk("a.bin", 0, Bytes::from_static(b"a long first version"))
            .await
            .unwrap();
        dest.truncate("a.bin").await.unwrap();
        dest.write_chunk("a.bin", 0, Bytes::from_static(b"short"))
            .await
            .unwrap();

        let written = fs::read(dir.path().join("a.bin")).await.unwrap();
        assert_eq!(written, b"short");
    }

    #[tokio::test]
    async fn out_of_order_offsets_supported() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path()).await.unwrap();

        dest.truncate("b.bin").await.unwrap();
        dest.write_chunk("b.bin", 5, Bytes::from_static(b"tail"))
            .await
            .unwrap();
        dest.write_chunk("b.bin", 0, Bytes::from_static(b"head "))
            .await
            .unwrap();

        let written = fs::read(dir.path().join("b.bin")).await.unwrap();
        assert_eq!(written, b"head tail");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path()).await.unwrap();

        dest.write_chunk("c.bin", 0, Bytes::from_static(b"x"))
            .await
            .unwrap();
        dest.remove("c.bin").await.unwrap();
        dest.remove("c.bin").await.unwrap();
        assert_eq!(dest.committed_size("c.bin").await.unwrap(), None);
    }

    #[tokio::test]
    async fn traversal_paths_rejected() {
        let dir = tempdir().unwrap();
        let dest = LocalDestination::new(dir.path()).await.unwrap();
        let result = dest
            .write_chunk("../escape.bin", 0, Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(TransportError::Config(_))));
    }
}
