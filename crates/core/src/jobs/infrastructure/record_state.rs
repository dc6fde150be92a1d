use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::{StudentRecord, TeacherRecord};
use crate::jobs::domain::video_job::VideoJob;

/// The full contents of a record store, shared by the in-memory and JSON
/// backends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct RecordState {
    jobs: Vec<VideoJob>,
    students: Vec<StudentRecord>,
    teachers: Vec<TeacherRecord>,
}

impl RecordState {
    pub(super) fn insert_job(&mut self, job: VideoJob) -> Result<(), StoreError> {
        if self.jobs.iter().any(|j| j.id == job.id) {
            return Err(StoreError::Duplicate {
                kind: "job",
                key: job.id,
            });
        }
        self.jobs.push(job);
        Ok(())
    }

    pub(super) fn claim_pending(&mut self, now: DateTime<Utc>, lease: Duration) -> Vec<VideoJob> {
        let mut claimed = Vec::new();
        for job in self.jobs.iter_mut().filter(|j| j.is_claimable(now)) {
            job.claim(now, lease);
            claimed.push(job.clone());
        }
        claimed.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        claimed
    }

    pub(super) fn renew_lease(
        &mut self,
        job: &VideoJob,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Option<VideoJob> {
        let stored = self.jobs.iter_mut().find(|j| j.id == job.id)?;
        if stored.status != job.status {
            return None;
        }
        stored.claim(now, lease);
        Some(stored.clone())
    }

    pub(super) fn find_job(&self, id: &str) -> Option<VideoJob> {
        self.jobs.iter().find(|j| j.id == id).cloned()
    }

    /// Returns `true` if a job was removed.
    pub(super) fn delete_job(&mut self, id: &str) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|j| j.id != id);
        self.jobs.len() != before
    }

    pub(super) fn students_in(&self, batch: &str) -> Vec<StudentRecord> {
        self.students
            .iter()
            .filter(|s| s.batch == batch)
            .cloned()
            .collect()
    }

    pub(super) fn find_student(&self, roll: &str) -> Option<StudentRecord> {
        self.students.iter().find(|s| s.roll == roll).cloned()
    }

    pub(super) fn insert_student(&mut self, student: StudentRecord) -> Result<(), StoreError> {
        if self.find_student(&student.roll).is_some() {
            return Err(StoreError::Duplicate {
                kind: "student",
                key: student.roll,
            });
        }
        self.students.push(student);
        Ok(())
    }

    pub(super) fn delete_student(&mut self, roll: &str) -> Option<StudentRecord> {
        let index = self.students.iter().position(|s| s.roll == roll)?;
        Some(self.students.remove(index))
    }

    pub(super) fn student_rolls_by_batch(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_batch: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for student in &self.students {
            by_batch
                .entry(student.batch.clone())
                .or_default()
                .push(student.roll.clone());
        }
        by_batch
    }

    pub(super) fn find_teacher(&self, teacher_id: &str) -> Option<TeacherRecord> {
        self.teachers
            .iter()
            .find(|t| t.teacher_id == teacher_id)
            .cloned()
    }

    pub(super) fn insert_teacher(&mut self, teacher: TeacherRecord) -> Result<(), StoreError> {
        if self.find_teacher(&teacher.teacher_id).is_some() {
            return Err(StoreError::Duplicate {
                kind: "teacher",
                key: teacher.teacher_id,
            });
        }
        self.teachers.push(teacher);
        Ok(())
    }
}
