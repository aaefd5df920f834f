use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::plan::TransferPlan;

/// Transfer algorithm, selected once during planning from the object size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferStrategy {
    Direct,
    Chunked,
    ParallelChunked,
}

impl TransferStrategy {
    /// Pure threshold-based selection. Thresholds come from configuration,
    /// never hard-coded policy.
    pub fn select(bytes_total: u64, small_threshold: u64, large_threshold: u64) -> Self {
        if bytes_total < small_threshold {
            TransferStrategy::Direct
        } else if bytes_total < large_threshold {
            TransferStrategy::Chunked
        } else {
            TransferStrategy::ParallelChunked
        }
    }
}

impl Display for TransferStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransferStrategy::Direct => write!(f, "direct"),
            TransferStrategy::Chunked => write!(f, "chunked"),
            TransferStrategy::ParallelChunked => write!(f, "parallel_chunked"),
        }
    }
}

impl FromStr for TransferStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(TransferStrategy::Direct),
            "chunked" => Ok(TransferStrategy::Chunked),
            "parallel_chunked" => Ok(TransferStrategy::ParallelChunked),
            _ => Err(anyhow::anyhow!("Invalid transfer strategy: {}", s)),
        }
    }
}

/// Orchestrator state machine states. `Retrying` is the pseudo-state recorded
/// between failed and re-entered `Transferring` attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Validating,
    Authenticating,
    Planning,
    Transferring,
    Retrying,
    Verifying,
    Recording,
    Notifying,
    CleaningUp,
    Completed,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }
}

impl Display for TransferState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            TransferState::Validating => "validating",
            TransferState::Authenticating => "authenticating",
            TransferState::Planning => "planning",
            TransferState::Transferring => "transferring",
            TransferState::Retrying => "retrying",
            TransferState::Verifying => "verifying",
            TransferState::Recording => "recording",
            TransferState::Notifying => "notifying",
            TransferState::CleaningUp => "cleaning_up",
            TransferState::Completed => "completed",
            TransferState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Failure summary kept on the record: taxonomy kind and final attempt count,
/// never a raw transport error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedError {
    pub kind: String,
    pub message: String,
    pub attempts: u32,
}

/// Persistent per-transfer record. Created when a plan is accepted; mutated
/// only by the orchestrator as the state machine advances; retained after
/// completion under the store's long retention TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub subject: String,
    pub approval_reference: String,
    pub session_token: Option<Uuid>,
    pub plan: TransferPlan,
    pub strategy: Option<TransferStrategy>,
    pub state: TransferState,
    pub bytes_total: u64,
    pub bytes_transferred: u64,
    pub checksum_expected: Option<String>,
    pub checksum_actual: Option<String>,
    pub attempt_count: u32,
    /// Transfer succeeded but the audit collaborator could not be reached.
    pub degraded: bool,
    pub ticket_ref: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<RecordedError>,
}

impl TransferRecord {
    pub fn new(subject: &str, approval_reference: &str, plan: TransferPlan) -> Self {
        TransferRecord {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            approval_reference: approval_reference.to_string(),
            session_token: None,
            plan,
            strategy: None,
            state: TransferState::Validating,
            bytes_total: 0,
            bytes_transferred: 0,
            checksum_expected: None,
            checksum_actual: None,
            attempt_count: 0,
            degraded: false,
            ticket_ref: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn progress_percent(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (self.bytes_transferred as f64 / self.bytes_total as f64) * 100.0
        }
    }

    /// Copy with destination password masked, for persistence and status
    /// responses.
    pub fn redacted(&self) -> TransferRecord {
        let mut record = self.clone();
        record.plan = self.plan.redacted();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    #[test]
    fn strategy_selection_follows_thresholds() {
        let small = 100 * MIB;
        let large = GIB;

        // 50 MiB object stays on a single stream.
        assert_eq!(
            TransferStrategy::select(50 * MIB, small, large),
            TransferStrategy::Direct
        );
        assert_eq!(
            TransferStrategy::select(500 * MIB, small, large),
            TransferStrategy::Chunked
        );
        assert_eq!(
            TransferStrategy::select(2 * GIB, small, large),
            TransferStrategy::ParallelChunked
        );
        // Boundaries are inclusive on the upper side.
        assert_eq!(
            TransferStrategy::select(small, small, large),
            TransferStrategy::Chunked
        );
        assert_eq!(
            TransferStrategy::select(large, small, large),
            TransferStrategy::ParallelChunked
        );
    }

    #[test]
    fn terminal_states() {
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(!TransferState::Transferring.is_terminal());
        assert!(!TransferState::CleaningUp.is_terminal());
    }

    #[test]
    fn strategy_round_trips_through_str() {
        for strategy in ["direct", "chunked", "parallel_chunked"] {
            let parsed: TransferStrategy = strategy.parse().unwrap();
            assert_eq!(parsed.to_string(), strategy);
        }
    }

    #[test]
    fn progress_percent_handles_zero_total() {
        let plan = crate::models::plan::TransferPlan {
            source: crate::models::plan::SourceLocation {
                container: "c".to_string(),
                object_key: "k".to_string(),
            },
            destination: crate::models::plan::DestinationSpec {
                protocol: crate::models::plan::DestinationProtocol::Ftp,
                host: "h".to_string(),
                port: 21,
                username: "u".to_string(),
                password: crate::models::plan::Secret::new("p"),
                remote_path: "/in".to_string(),
                remote_filename: None,
            },
            checksum_expected: None,
        };
        let mut record = TransferRecord::new("user", "REQ-1001", plan);
        assert_eq!(record.progress_percent(), 0.0);
        record.bytes_total = 200;
        record.bytes_transferred = 50;
        assert_eq!(record.progress_percent(), 25.0);
    }
}
