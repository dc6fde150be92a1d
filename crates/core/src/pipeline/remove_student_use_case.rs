use std::sync::Arc;

use thiserror::Error;

use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::StudentRecord;

#[derive(Error, Debug)]
pub enum RemoveError {
    #[error("student {0} is not enrolled")]
    UnknownStudent(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Removes a student and their enrolled embeddings.
///
/// Attendance already recorded for the student stays in the ledgers; the
/// student is simply no longer looked for in new videos. The roll can be
/// enrolled again afterwards.
pub struct RemoveStudentUseCase {
    records: Arc<dyn RecordStore>,
}

impl RemoveStudentUseCase {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub fn execute(&self, roll: &str) -> Result<StudentRecord, RemoveError> {
        let removed = self
            .records
            .delete_student(roll)?
            .ok_or_else(|| RemoveError::UnknownStudent(roll.to_string()))?;
        log::info!(
            "Removed {roll} from {} ({} embeddings)",
            removed.batch,
            removed.embeddings.len()
        );
        Ok(removed)
    }
}
