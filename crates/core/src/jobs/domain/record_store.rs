use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::{StudentRecord, TeacherRecord};
use crate::jobs::domain::video_job::VideoJob;

/// Document store for jobs, students and teachers.
pub trait RecordStore: Send + Sync {
    fn insert_job(&self, job: VideoJob) -> Result<(), StoreError>;

    /// Atomically moves every claimable job to `Processing` with a lease
    /// expiring `lease` after `now`, returning the claimed jobs in
    /// submission order.
    fn claim_pending_jobs(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<VideoJob>, StoreError>;

    /// Extends the lease of `job` to `lease` after `now`, provided the
    /// stored job still carries the status `job` was claimed with. Returns
    /// `None` when the job is gone or has been claimed again since.
    fn renew_lease(
        &self,
        job: &VideoJob,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<VideoJob>, StoreError>;

    fn find_job(&self, id: &str) -> Result<Option<VideoJob>, StoreError>;

    /// Removing an unknown job succeeds.
    fn delete_job(&self, id: &str) -> Result<(), StoreError>;

    /// Students of `batch` in insertion order.
    fn find_students(&self, batch: &str) -> Result<Vec<StudentRecord>, StoreError>;

    fn find_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the roll is already enrolled.
    fn insert_student(&self, student: StudentRecord) -> Result<(), StoreError>;

    /// Removes the student, returning the removed record if there was one.
    fn delete_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError>;

    /// Batch → rolls enrolled in it.
    fn list_students(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError>;

    fn find_teacher(&self, teacher_id: &str) -> Result<Option<TeacherRecord>, StoreError>;

    fn insert_teacher(&self, teacher: TeacherRecord) -> Result<(), StoreError>;
}
