use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attendance::domain::ledger::LedgerKey;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// Claimed by a worker. Once the lease has expired the job may be
    /// claimed again, so a crashed worker does not strand it.
    Processing { lease_expires_at: DateTime<Utc> },
}

/// A submitted classroom video awaiting attendance processing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: String,
    pub teacher_id: String,
    pub batch: String,
    pub media_ref: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn pending(
        id: &str,
        teacher_id: &str,
        batch: &str,
        media_ref: &str,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            teacher_id: teacher_id.to_string(),
            batch: batch.to_string(),
            media_ref: media_ref.to_string(),
            status: JobStatus::Pending,
            submitted_at,
        }
    }

    pub fn ledger_key(&self) -> LedgerKey {
        LedgerKey::new(&self.teacher_id, &self.batch)
    }

    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Processing { lease_expires_at } => lease_expires_at <= now,
        }
    }

    pub fn claim(&mut self, now: DateTime<Utc>, lease: Duration) {
        let lease_expires_at = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.status = JobStatus::Processing { lease_expires_at };
    }
}
