use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::{StudentRecord, TeacherRecord};
use crate::jobs::domain::video_job::VideoJob;

use super::record_state::RecordState;

#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<RecordState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, RecordState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert_job(&self, job: VideoJob) -> Result<(), StoreError> {
        self.state()?.insert_job(job)
    }

    fn claim_pending_jobs(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<VideoJob>, StoreError> {
        Ok(self.state()?.claim_pending(now, lease))
    }

    fn renew_lease(
        &self,
        job: &VideoJob,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<VideoJob>, StoreError> {
        Ok(self.state()?.renew_lease(job, now, lease))
    }

    fn find_job(&self, id: &str) -> Result<Option<VideoJob>, StoreError> {
        Ok(self.state()?.find_job(id))
    }

    fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        self.state()?.delete_job(id);
        Ok(())
    }

    fn find_students(&self, batch: &str) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.state()?.students_in(batch))
    }

    fn find_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self.state()?.find_student(roll))
    }

    fn insert_student(&self, student: StudentRecord) -> Result<(), StoreError> {
        self.state()?.insert_student(student)
    }

    fn delete_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self.state()?.delete_student(roll))
    }

    fn list_students(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        Ok(self.state()?.student_rolls_by_batch())
    }

    fn find_teacher(&self, teacher_id: &str) -> Result<Option<TeacherRecord>, StoreError> {
        Ok(self.state()?.find_teacher(teacher_id))
    }

    fn insert_teacher(&self, teacher: TeacherRecord) -> Result<(), StoreError> {
        self.state()?.insert_teacher(teacher)
    }
}
