//! Configuration module
//!
//! Every retry count, backoff base, size threshold, TTL, and timeout is
//! configuration. The defaults are the design values; `from_env` overrides
//! them from the environment and `validate` rejects inconsistent settings.

use std::env;
use std::time::Duration;

const SESSION_TTL_SECS: u64 = 10;
const APPROVAL_RETENTION_SECS: u64 = 86_400;
const RECORD_RETENTION_SECS: u64 = 30 * 86_400;
const CHUNK_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const SMALL_OBJECT_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;
const LARGE_OBJECT_THRESHOLD_BYTES: u64 = 1024 * 1024 * 1024;
const MAX_PARALLEL_WORKERS: usize = 5;
const CHUNK_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_SECS: u64 = 300;
const AUTH_MAX_RETRIES: u32 = 3;
const TRANSFER_MAX_ATTEMPTS: u32 = 3;
const AUTH_TIMEOUT_SECS: u64 = 30;
const TRANSFER_TIMEOUT_SECS: u64 = 3600;
const VERIFY_TIMEOUT_SECS: u64 = 600;
const PROGRESS_WRITE_INTERVAL_BYTES: u64 = 10 * 1024 * 1024;
const COLLABORATOR_TIMEOUT_SECS: u64 = 30;
const COLLABORATOR_MAX_RETRIES: u32 = 3;

/// Which backend serves source objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBackend {
    S3,
    Local,
}

/// Source object-store settings. The container (bucket) comes from each
/// transfer plan; the backend, region and endpoint are deployment-wide.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub backend: SourceBackend,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub s3_endpoint: Option<String>,
    pub local_root: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            backend: SourceBackend::S3,
            s3_region: None,
            s3_endpoint: None,
            local_root: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FerryConfig {
    // Session broker
    pub session_ttl_secs: u64,
    pub approval_retention_secs: u64,

    // Progress store
    pub record_retention_secs: u64,
    pub progress_write_interval_bytes: u64,

    // Transfer engine
    pub chunk_size_bytes: u64,
    pub small_object_threshold_bytes: u64,
    pub large_object_threshold_bytes: u64,
    pub max_parallel_workers: usize,
    pub chunk_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_secs: u64,

    // Orchestrator
    pub auth_max_retries: u32,
    pub transfer_max_attempts: u32,
    pub auth_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub cleanup_partial_on_failure: bool,

    // Collaborators
    pub audit_endpoint: Option<String>,
    pub audit_signing_secret: Option<String>,
    pub notify_endpoint: Option<String>,
    pub collaborator_timeout_secs: u64,
    pub collaborator_max_retries: u32,

    pub source: SourceConfig,
}

impl Default for FerryConfig {
    fn default() -> Self {
        FerryConfig {
            session_ttl_secs: SESSION_TTL_SECS,
            approval_retention_secs: APPROVAL_RETENTION_SECS,
            record_retention_secs: RECORD_RETENTION_SECS,
            progress_write_interval_bytes: PROGRESS_WRITE_INTERVAL_BYTES,
            chunk_size_bytes: CHUNK_SIZE_BYTES,
            small_object_threshold_bytes: SMALL_OBJECT_THRESHOLD_BYTES,
            large_object_threshold_bytes: LARGE_OBJECT_THRESHOLD_BYTES,
            max_parallel_workers: MAX_PARALLEL_WORKERS,
            chunk_max_retries: CHUNK_MAX_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            retry_max_delay_secs: RETRY_MAX_DELAY_SECS,
            auth_max_retries: AUTH_MAX_RETRIES,
            transfer_max_attempts: TRANSFER_MAX_ATTEMPTS,
            auth_timeout_secs: AUTH_TIMEOUT_SECS,
            transfer_timeout_secs: TRANSFER_TIMEOUT_SECS,
            verify_timeout_secs: VERIFY_TIMEOUT_SECS,
            cleanup_partial_on_failure: true,
            audit_endpoint: None,
            audit_signing_secret: None,
            notify_endpoint: None,
            collaborator_timeout_secs: COLLABORATOR_TIMEOUT_SECS,
            collaborator_max_retries: COLLABORATOR_MAX_RETRIES,
            source: SourceConfig::default(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|s| s.to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

impl FerryConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let backend = env::var("FERRY_SOURCE_BACKEND")
            .ok()
            .map(|s| match s.to_lowercase().as_str() {
                "s3" => Ok(SourceBackend::S3),
                "local" => Ok(SourceBackend::Local),
                other => Err(anyhow::anyhow!("Unknown source backend: {}", other)),
            })
            .transpose()?
            .unwrap_or(SourceBackend::S3);

        let config = FerryConfig {
            session_ttl_secs: env_u64("FERRY_SESSION_TTL_SECS", SESSION_TTL_SECS),
            approval_retention_secs: env_u64(
                "FERRY_APPROVAL_RETENTION_SECS",
                APPROVAL_RETENTION_SECS,
            ),
            record_retention_secs: env_u64("FERRY_RECORD_RETENTION_SECS", RECORD_RETENTION_SECS),
            progress_write_interval_bytes: env_u64(
                "FERRY_PROGRESS_WRITE_INTERVAL_BYTES",
                PROGRESS_WRITE_INTERVAL_BYTES,
            ),
            chunk_size_bytes: env_u64("FERRY_CHUNK_SIZE_BYTES", CHUNK_SIZE_BYTES),
            small_object_threshold_bytes: env_u64(
                "FERRY_SMALL_OBJECT_THRESHOLD_BYTES",
                SMALL_OBJECT_THRESHOLD_BYTES,
            ),
            large_object_threshold_bytes: env_u64(
                "FERRY_LARGE_OBJECT_THRESHOLD_BYTES",
                LARGE_OBJECT_THRESHOLD_BYTES,
            ),
            max_parallel_workers: env_usize("FERRY_MAX_PARALLEL_WORKERS", MAX_PARALLEL_WORKERS),
            chunk_max_retries: env_u32("FERRY_CHUNK_MAX_RETRIES", CHUNK_MAX_RETRIES),
            retry_base_delay_ms: env_u64("FERRY_RETRY_BASE_DELAY_MS", RETRY_BASE_DELAY_MS),
            retry_max_delay_secs: env_u64("FERRY_RETRY_MAX_DELAY_SECS", RETRY_MAX_DELAY_SECS),
            auth_max_retries: env_u32("FERRY_AUTH_MAX_RETRIES", AUTH_MAX_RETRIES),
            transfer_max_attempts: env_u32("FERRY_TRANSFER_MAX_ATTEMPTS", TRANSFER_MAX_ATTEMPTS),
            auth_timeout_secs: env_u64("FERRY_AUTH_TIMEOUT_SECS", AUTH_TIMEOUT_SECS),
            transfer_timeout_secs: env_u64("FERRY_TRANSFER_TIMEOUT_SECS", TRANSFER_TIMEOUT_SECS),
            verify_timeout_secs: env_u64("FERRY_VERIFY_TIMEOUT_SECS", VERIFY_TIMEOUT_SECS),
            cleanup_partial_on_failure: env_bool("FERRY_CLEANUP_PARTIAL_ON_FAILURE", true),
            audit_endpoint: env_opt("FERRY_AUDIT_ENDPOINT"),
            audit_signing_secret: env_opt("FERRY_AUDIT_SIGNING_SECRET"),
            notify_endpoint: env_opt("FERRY_NOTIFY_ENDPOINT"),
            collaborator_timeout_secs: env_u64(
                "FERRY_COLLABORATOR_TIMEOUT_SECS",
                COLLABORATOR_TIMEOUT_SECS,
            ),
            collaborator_max_retries: env_u32(
                "FERRY_COLLABORATOR_MAX_RETRIES",
                COLLABORATOR_MAX_RETRIES,
            ),
            source: SourceConfig {
                backend,
                s3_region: env_opt("FERRY_S3_REGION").or_else(|| env_opt("AWS_REGION")),
                s3_endpoint: env_opt("FERRY_S3_ENDPOINT"),
                local_root: env_opt("FERRY_LOCAL_SOURCE_ROOT"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("FERRY_CHUNK_SIZE_BYTES must be positive"));
        }
        if self.small_object_threshold_bytes >= self.large_object_threshold_bytes {
            return Err(anyhow::anyhow!(
                "FERRY_SMALL_OBJECT_THRESHOLD_BYTES must be below FERRY_LARGE_OBJECT_THRESHOLD_BYTES"
            ));
        }
        if self.max_parallel_workers == 0 {
            return Err(anyhow::anyhow!("FERRY_MAX_PARALLEL_WORKERS must be at least 1"));
        }
        if self.session_ttl_secs == 0 {
            return Err(anyhow::anyhow!("FERRY_SESSION_TTL_SECS must be positive"));
        }
        if self.transfer_max_attempts == 0 {
            return Err(anyhow::anyhow!("FERRY_TRANSFER_MAX_ATTEMPTS must be at least 1"));
        }
        if self.source.backend == SourceBackend::Local && self.source.local_root.is_none() {
            return Err(anyhow::anyhow!(
                "FERRY_LOCAL_SOURCE_ROOT must be set when using the local source backend"
            ));
        }
        if self.audit_signing_secret.is_some() && self.audit_endpoint.is_none() {
            return Err(anyhow::anyhow!(
                "FERRY_AUDIT_SIGNING_SECRET requires FERRY_AUDIT_ENDPOINT"
            ));
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn approval_retention(&self) -> Duration {
        Duration::from_secs(self.approval_retention_secs)
    }

    pub fn record_retention(&self) -> Duration {
        Duration::from_secs(self.record_retention_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_design_values() {
        let config = FerryConfig::default();
        assert_eq!(config.session_ttl_secs, 10);
        assert_eq!(config.chunk_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.small_object_threshold_bytes, 100 * 1024 * 1024);
        assert_eq!(config.large_object_threshold_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.max_parallel_workers, 5);
        assert_eq!(config.transfer_max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = FerryConfig::default();
        config.small_object_threshold_bytes = config.large_object_threshold_bytes;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut config = FerryConfig::default();
        config.chunk_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn local_backend_requires_root() {
        let mut config = FerryConfig::default();
        config.source.backend = SourceBackend::Local;
        assert!(config.validate().is_err());
        config.source.local_root = Some("/var/lib/ferry/objects".to_string());
        assert!(config.validate().is_ok());
    }
}
