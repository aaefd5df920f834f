//! Transfer record repository
//!
//! Typed wrapper over the key-value store. Records carry the long retention
//! TTL (distinct from the session's short TTL) and the TTL is refreshed on
//! every update, so retention counts from the last state change. Destination
//! passwords are masked before anything is persisted.

use ferry_core::{FerryError, TransferRecord};
use ferry_store::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct TransferRecordStore {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
}

fn record_key(id: Uuid) -> String {
    format!("transfer/{}", id)
}

impl TransferRecordStore {
    pub fn new(store: Arc<dyn KeyValueStore>, retention: Duration) -> Self {
        TransferRecordStore { store, retention }
    }

    pub async fn save(&self, record: &TransferRecord) -> Result<(), FerryError> {
        let value = serde_json::to_value(record.redacted())?;
        self.store
            .put(&record_key(record.id), value, Some(self.retention))
            .await
            .map_err(|e| FerryError::TransientInfrastructure(e.to_string()))
    }

    /// Fetch a record. The destination password is masked.
    pub async fn get(&self, id: Uuid) -> Result<Option<TransferRecord>, FerryError> {
        let value = self
            .store
            .get(&record_key(id))
            .await
            .map_err(|e| FerryError::TransientInfrastructure(e.to_string()))?;
        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_progress(&self, id: Uuid, bytes_transferred: u64) -> Result<(), FerryError> {
        if let Some(mut record) = self.get(id).await? {
            record.bytes_transferred = bytes_transferred;
            self.save(&record).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{
        DestinationProtocol, DestinationSpec, Secret, SourceLocation, TransferPlan,
    };
    use ferry_store::{MemoryStore, MemoryStoreConfig};

    fn record() -> TransferRecord {
        TransferRecord::new(
            "user@example.com",
            "REQ-1001",
            TransferPlan {
                source: SourceLocation {
                    container: "finance-exports".to_string(),
                    object_key: "reports/q3.csv".to_string(),
                },
                destination: DestinationSpec {
                    protocol: DestinationProtocol::Sftp,
                    host: "drop.example.com".to_string(),
                    port: 22,
                    username: "ferry".to_string(),
                    password: Secret::new("hunter2"),
                    remote_path: "/incoming".to_string(),
                    remote_filename: None,
                },
                checksum_expected: None,
            },
        )
    }

    fn repo() -> TransferRecordStore {
        let store = Arc::new(MemoryStore::with_config(MemoryStoreConfig {
            marker_ttl: None,
            sweep_interval: Duration::ZERO,
        }));
        TransferRecordStore::new(store, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let repo = repo();
        let record = record();
        repo.save(&record).await.unwrap();

        let loaded = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.subject, record.subject);
    }

    #[tokio::test]
    async fn persisted_record_masks_the_password() {
        let repo = repo();
        let record = record();
        repo.save(&record).await.unwrap();

        let loaded = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.plan.destination.password.expose(), "[redacted]");
    }

    #[tokio::test]
    async fn set_progress_updates_bytes() {
        let repo = repo();
        let mut record = record();
        record.bytes_total = 1000;
        repo.save(&record).await.unwrap();

        repo.set_progress(record.id, 250).await.unwrap();
        let loaded = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.bytes_transferred, 250);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let repo = repo();
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
