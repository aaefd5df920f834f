#[cfg(feature = "storage-local")]
use crate::LocalObjectSource;
#[cfg(feature = "storage-s3")]
use crate::S3ObjectSource;
use crate::{ObjectSource, SourceError, SourceResult};
use ferry_core::{Credentials, SourceBackend, SourceConfig};
use std::sync::Arc;

/// Create a source backend for one container from configuration and the
/// session's ephemeral credentials.
pub async fn create_source(
    config: &SourceConfig,
    container: &str,
    credentials: &Credentials,
) -> SourceResult<Arc<dyn ObjectSource>> {
    match config.backend {
        #[cfg(feature = "storage-s3")]
        SourceBackend::S3 => {
            let region = config
                .s3_region
                .clone()
                .or_else(|| credentials.region.clone())
                .ok_or_else(|| {
                    SourceError::Config("FERRY_S3_REGION or AWS_REGION not configured".to_string())
                })?;
            let endpoint = config.s3_endpoint.clone();

            let source =
                S3ObjectSource::new(container.to_string(), region, endpoint, credentials).await?;
            Ok(Arc::new(source))
        }

        #[cfg(not(feature = "storage-s3"))]
        SourceBackend::S3 => Err(SourceError::Config(
            "S3 source backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        SourceBackend::Local => {
            let root = config.local_root.clone().ok_or_else(|| {
                SourceError::Config("FERRY_LOCAL_SOURCE_ROOT not configured".to_string())
            })?;

            let source =
                LocalObjectSource::new(std::path::Path::new(&root).join(container)).await?;
            Ok(Arc::new(source))
        }

        #[cfg(not(feature = "storage-local"))]
        SourceBackend::Local => Err(SourceError::Config(
            "Local source backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
