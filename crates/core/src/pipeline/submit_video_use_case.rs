use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::domain::media_store::MediaStore;
use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::video_job::VideoJob;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("unknown teacher: {0}")]
    UnknownTeacher(String),
    #[error("batch must not be empty")]
    EmptyBatch,
    #[error("video is empty")]
    EmptyVideo,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Uploads a classroom video and queues it as a pending job.
pub struct SubmitVideoUseCase {
    records: Arc<dyn RecordStore>,
    media: Arc<dyn MediaStore>,
}

impl SubmitVideoUseCase {
    pub fn new(records: Arc<dyn RecordStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { records, media }
    }

    /// Stores `bytes` and inserts a pending job for `(teacher_id, batch)`.
    ///
    /// If the job record cannot be inserted the upload is removed again, so
    /// no media is left without a job pointing at it.
    pub fn execute(
        &self,
        teacher_id: &str,
        batch: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<VideoJob, SubmitError> {
        if batch.trim().is_empty() {
            return Err(SubmitError::EmptyBatch);
        }
        if bytes.is_empty() {
            return Err(SubmitError::EmptyVideo);
        }
        if self.records.find_teacher(teacher_id)?.is_none() {
            return Err(SubmitError::UnknownTeacher(teacher_id.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let name = media_name(&id, teacher_id, batch, file_name);
        let media_ref = self.media.upload(&name, bytes)?;
        let job = VideoJob::pending(&id, teacher_id, batch, &media_ref, Utc::now());

        if let Err(e) = self.records.insert_job(job.clone()) {
            if let Err(cleanup) = self.media.delete(&media_ref) {
                log::warn!("Could not remove orphaned upload {media_ref}: {cleanup}");
            }
            return Err(e.into());
        }

        log::info!(
            "Queued {} ({} bytes) as job {id} for {teacher_id}/{batch}",
            name,
            bytes.len()
        );
        Ok(job)
    }
}

/// `<teacher>_<batch>_<id prefix>_<file name>`, with path separators
/// replaced so the name is a single path component.
fn media_name(id: &str, teacher_id: &str, batch: &str, file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video.mp4");
    let short_id: String = id.chars().take(8).collect();
    format!("{teacher_id}_{batch}_{short_id}_{base}")
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::domain::student::TeacherRecord;
    use crate::jobs::domain::video_job::JobStatus;
    use crate::jobs::infrastructure::in_memory_media_store::InMemoryMediaStore;
    use crate::jobs::infrastructure::in_memory_record_store::InMemoryRecordStore;

    fn setup() -> (Arc<InMemoryRecordStore>, Arc<InMemoryMediaStore>, SubmitVideoUseCase) {
        let records = Arc::new(InMemoryRecordStore::new());
        let media = Arc::new(InMemoryMediaStore::new());
        records
            .insert_teacher(TeacherRecord {
                teacher_id: "t1".to_string(),
                name: "A. Sharma".to_string(),
            })
            .unwrap();
        let use_case = SubmitVideoUseCase::new(records.clone(), media.clone());
        (records, media, use_case)
    }

    #[test]
    fn test_submit_queues_pending_job() {
        let (records, media, use_case) = setup();

        let job = use_case
            .execute("t1", "10ea", "/home/t1/Videos/monday.mp4", b"video")
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.ledger_key().to_string(), "t1/10ea");
        assert!(job.media_ref.starts_with("t1_10ea_"));
        assert!(job.media_ref.ends_with("_monday.mp4"));
        assert!(media.contains(&job.media_ref));
        assert_eq!(records.find_job(&job.id).unwrap(), Some(job));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let (_, media, use_case) = setup();
        let a = use_case.execute("t1", "10ea", "v.mp4", b"1").unwrap();
        let b = use_case.execute("t1", "10ea", "v.mp4", b"2").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(media.len(), 2);
    }

    #[test]
    fn test_unknown_teacher_uploads_nothing() {
        let (_, media, use_case) = setup();
        let result = use_case.execute("t9", "10ea", "v.mp4", b"video");
        assert!(matches!(result, Err(SubmitError::UnknownTeacher(ref t)) if t == "t9"));
        assert!(media.is_empty());
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let (_, _, use_case) = setup();
        assert!(matches!(
            use_case.execute("t1", "10ea", "v.mp4", b""),
            Err(SubmitError::EmptyVideo)
        ));
        assert!(matches!(
            use_case.execute("t1", " ", "v.mp4", b"video"),
            Err(SubmitError::EmptyBatch)
        ));
    }

    #[test]
    fn test_media_name_is_single_component() {
        let name = media_name("0123456789", "t/1", "10\\ea", "clip.mp4");
        assert_eq!(name, "t_1_10_ea_01234567_clip.mp4");
    }
}
