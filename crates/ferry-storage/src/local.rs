use crate::traits::{ByteStream, ObjectSource, ObjectStat, SourceError, SourceResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::ops::Range;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Local filesystem source implementation
///
/// Serves objects from a directory tree. Used for development and tests; the
/// traversal rules match the validation applied to object keys at intake.
#[derive(Clone)]
pub struct LocalObjectSource {
    root: PathBuf,
}

impl LocalObjectSource {
    pub async fn new(root: impl Into<PathBuf>) -> SourceResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            SourceError::Config(format!(
                "Failed to create source directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(LocalObjectSource { root })
    }

    /// Convert an object key to a filesystem path, rejecting traversal.
    fn key_to_path(&self, object_key: &str) -> SourceResult<PathBuf> {
        if object_key.is_empty()
            || object_key.starts_with('/')
            || object_key.split('/').any(|seg| seg == "..")
        {
            return Err(SourceError::Config(format!(
                "Object key {} is not a valid relative key",
                object_key
            )));
        }
        Ok(self.root.join(object_key))
    }
}

#[async_trait]
impl ObjectSource for LocalObjectSource {
    async fn stat(&self, object_key: &str) -> SourceResult<ObjectStat> {
        let path = self.key_to_path(object_key)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(object_key.to_string())
            } else {
                SourceError::ReadFailed(e.to_string())
            }
        })?;
        Ok(ObjectStat {
            size: meta.len(),
            e_tag: None,
        })
    }

    async fn read_range(&self, object_key: &str, range: Range<u64>) -> SourceResult<Bytes> {
        let path = self.key_to_path(object_key)?;
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(object_key.to_string())
            } else {
                SourceError::ReadFailed(e.to_string())
            }
        })?;

        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| SourceError::ReadFailed(e.to_string()))?;

        let length = (range.end - range.start) as usize;
        let mut buffer = vec![0u8; length];
        let mut filled = 0;
        while filled < length {
            let n = file
                .read(&mut buffer[filled..])
                .await
                .map_err(|e| SourceError::ReadFailed(e.to_string()))?;
            if n == 0 {
                return Err(SourceError::ReadFailed(format!(
                    "Object {} ended at byte {} inside requested range",
                    object_key,
                    range.start + filled as u64
                )));
            }
            filled += n;
        }

        Ok(Bytes::from(buffer))
    }

    async fn read_stream(&self, object_key: &str) -> SourceResult<ByteStream> {
        let path = self.key_to_path(object_key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(object_key.to_string())
            } else {
                SourceError::ReadFailed(e.to_string())
            }
        })?;

        let reader = tokio_util::io::ReaderStream::new(file);
        let stream = reader.map(|res| res.map_err(|e| SourceError::ReadFailed(e.to_string())));
        Ok(Box::pin(stream))
    }

    async fn exists(&self, object_key: &str) -> SourceResult<bool> {
        let path = self.key_to_path(object_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}
