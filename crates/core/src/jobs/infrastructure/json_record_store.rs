use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::{StudentRecord, TeacherRecord};
use crate::jobs::domain::video_job::VideoJob;
use crate::shared::atomic_file::write_atomic;

use super::record_state::RecordState;

/// Record store persisted as a single JSON document.
///
/// Every operation reloads the file, so records written by another process
/// between calls are seen. Claims are atomic within this process only.
pub struct JsonRecordStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.guard.lock().map_err(|_| StoreError::Poisoned)
    }

    fn load(&self) -> Result<RecordState, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RecordState::default())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &RecordState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn read<T>(&self, f: impl FnOnce(&RecordState) -> T) -> Result<T, StoreError> {
        let _guard = self.lock()?;
        Ok(f(&self.load()?))
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut RecordState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock()?;
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}

impl RecordStore for JsonRecordStore {
    fn insert_job(&self, job: VideoJob) -> Result<(), StoreError> {
        self.update(|state| state.insert_job(job))
    }

    fn claim_pending_jobs(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<VideoJob>, StoreError> {
        self.update(|state| Ok(state.claim_pending(now, lease)))
    }

    fn renew_lease(
        &self,
        job: &VideoJob,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<VideoJob>, StoreError> {
        self.update(|state| Ok(state.renew_lease(job, now, lease)))
    }

    fn find_job(&self, id: &str) -> Result<Option<VideoJob>, StoreError> {
        self.read(|state| state.find_job(id))
    }

    fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        self.update(|state| {
            state.delete_job(id);
            Ok(())
        })
    }

    fn find_students(&self, batch: &str) -> Result<Vec<StudentRecord>, StoreError> {
        self.read(|state| state.students_in(batch))
    }

    fn find_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError> {
        self.read(|state| state.find_student(roll))
    }

    fn insert_student(&self, student: StudentRecord) -> Result<(), StoreError> {
        self.update(|state| state.insert_student(student))
    }

    fn delete_student(&self, roll: &str) -> Result<Option<StudentRecord>, StoreError> {
        self.update(|state| Ok(state.delete_student(roll)))
    }

    fn list_students(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        self.read(RecordState::student_rolls_by_batch)
    }

    fn find_teacher(&self, teacher_id: &str) -> Result<Option<TeacherRecord>, StoreError> {
        self.read(|state| state.find_teacher(teacher_id))
    }

    fn insert_teacher(&self, teacher: TeacherRecord) -> Result<(), StoreError> {
        self.update(|state| state.insert_teacher(teacher))
    }
}
