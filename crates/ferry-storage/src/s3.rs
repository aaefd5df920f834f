use crate::traits::{ByteStream, ObjectSource, ObjectStat, SourceError, SourceResult};
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::Credentials;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Error as ObjectStoreError, ObjectStore, ObjectStoreExt};
use std::ops::Range;

/// S3 source implementation
///
/// Built from the session's ephemeral credentials rather than ambient
/// environment material, so the client's authority is exactly the scope the
/// identity provider issued.
#[derive(Clone)]
pub struct S3ObjectSource {
    store: AmazonS3,
    bucket: String,
}

impl S3ObjectSource {
    /// Create a new S3ObjectSource for one bucket.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name (the plan's source container)
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `credentials` - Ephemeral read-only credentials from the session
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        credentials: &Credentials,
    ) -> SourceResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_region(region)
            .with_bucket_name(bucket.clone())
            .with_access_key_id(credentials.access_key_id.clone())
            .with_secret_access_key(credentials.secret_access_key.expose());

        if let Some(ref token) = credentials.session_token {
            builder = builder.with_token(token.expose());
        }

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| SourceError::Config(e.to_string()))?;

        Ok(S3ObjectSource { store, bucket })
    }

    fn map_error(&self, object_key: &str, err: ObjectStoreError) -> SourceError {
        match err {
            ObjectStoreError::NotFound { .. } => SourceError::NotFound(object_key.to_string()),
            other => SourceError::ReadFailed(other.to_string()),
        }
    }
}

#[async_trait]
impl ObjectSource for S3ObjectSource {
    async fn stat(&self, object_key: &str) -> SourceResult<ObjectStat> {
        let location = Path::from(object_key);
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| self.map_error(object_key, e))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %object_key,
            size_bytes = meta.size,
            "S3 stat"
        );

        Ok(ObjectStat {
            size: meta.size,
            e_tag: meta.e_tag,
        })
    }

    async fn read_range(&self, object_key: &str, range: Range<u64>) -> SourceResult<Bytes> {
        let location = Path::from(object_key);
        let start = std::time::Instant::now();
        let length = range.end - range.start;

        let bytes = self
            .store
            .get_range(&location, range.clone())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %object_key,
                    offset = range.start,
                    length,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 range read failed"
                );
                self.map_error(object_key, e)
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %object_key,
            offset = range.start,
            length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 range read"
        );

        Ok(bytes)
    }

    async fn read_stream(&self, object_key: &str) -> SourceResult<ByteStream> {
        let location = Path::from(object_key);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.map_error(object_key, e))?;

        let bucket = self.bucket.clone();
        let key = object_key.to_string();

        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "S3 stream read error"
                );
                SourceError::ReadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, object_key: &str) -> SourceResult<bool> {
        let location = Path::from(object_key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(SourceError::ReadFailed(e.to_string())),
        }
    }
}
