//! Progress reporting
//!
//! The engine reports, the caller persists. Callbacks fire after each write
//! or chunk acknowledgement on the task driving the transfer.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub bytes_transferred: u64,
    pub bytes_total: u64,
}

impl ProgressUpdate {
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (self.bytes_transferred as f64 / self.bytes_total as f64) * 100.0
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Callback that discards every update.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_| {})
}
