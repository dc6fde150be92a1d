use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::StudentRecord;
use crate::recognition::domain::face_detector::FaceDetector;
use crate::recognition::domain::face_encoder::{Embedding, FaceEncoder};
use crate::shared::frame::Frame;

/// Decodes one enrollment photo.
pub type ImageLoader = fn(&Path) -> Result<Frame, Box<dyn std::error::Error>>;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("student {0} is already enrolled")]
    DuplicateStudent(String),
    #[error("roll number and batch must not be empty")]
    MissingIdentity,
    #[error("face analysis failed on {path}: {message}")]
    Oracle { path: PathBuf, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrollReport {
    pub roll: String,
    pub embeddings: usize,
    /// Photos that could not be read or showed no face, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Registers a student with one embedding per usable enrollment photo.
///
/// Only the first detected face of each photo is used, so photos should
/// show the student alone. Photos that cannot be decoded or contain no face
/// are skipped. A student whose photos all fail is still recorded, without
/// embeddings, and will never be detected.
pub struct EnrollStudentUseCase {
    records: Arc<dyn RecordStore>,
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
    loader: ImageLoader,
}

impl EnrollStudentUseCase {
    pub fn new(
        records: Arc<dyn RecordStore>,
        detector: Box<dyn FaceDetector>,
        encoder: Box<dyn FaceEncoder>,
        loader: ImageLoader,
    ) -> Self {
        Self {
            records,
            detector,
            encoder,
            loader,
        }
    }

    pub fn execute(
        &mut self,
        roll: &str,
        batch: &str,
        images: &[PathBuf],
    ) -> Result<EnrollReport, EnrollError> {
        if roll.trim().is_empty() || batch.trim().is_empty() {
            return Err(EnrollError::MissingIdentity);
        }
        if self.records.find_student(roll)?.is_some() {
            return Err(EnrollError::DuplicateStudent(roll.to_string()));
        }

        let mut embeddings = Vec::new();
        let mut skipped = Vec::new();
        for path in images {
            match self.embed_first_face(path)? {
                Ok(embedding) => embeddings.push(embedding),
                Err(reason) => {
                    log::warn!("Skipping {}: {reason}", path.display());
                    skipped.push((path.clone(), reason));
                }
            }
        }
        if embeddings.is_empty() {
            log::warn!("No usable face for {roll}; the student cannot be detected until re-enrolled");
        }

        let count = embeddings.len();
        self.records
            .insert_student(StudentRecord {
                roll: roll.to_string(),
                batch: batch.to_string(),
                embeddings,
            })
            .map_err(|e| match e {
                StoreError::Duplicate { key, .. } => EnrollError::DuplicateStudent(key),
                other => EnrollError::Store(other),
            })?;
        log::info!("Enrolled {roll} in {batch} with {count} embeddings");

        Ok(EnrollReport {
            roll: roll.to_string(),
            embeddings: count,
            skipped,
        })
    }

    /// Outer error: the oracle failed. Inner error: the photo is unusable.
    fn embed_first_face(
        &mut self,
        path: &Path,
    ) -> Result<Result<Embedding, String>, EnrollError> {
        let frame = match (self.loader)(path) {
            Ok(frame) => frame,
            Err(e) => return Ok(Err(format!("unreadable image: {e}"))),
        };
        let oracle_err = |e: Box<dyn std::error::Error>| EnrollError::Oracle {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let regions = self.detector.detect(&frame).map_err(oracle_err)?;
        let Some(first) = regions.first() else {
            return Ok(Err("no face found".to_string()));
        };
        let embedding = self
            .encoder
            .encode(&frame, std::slice::from_ref(first))
            .map_err(oracle_err)?
            .into_iter()
            .next();
        Ok(embedding.ok_or_else(|| "face could not be encoded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::infrastructure::in_memory_record_store::InMemoryRecordStore;
    use crate::test_support::{FaceScript, ScriptedDetector, ScriptedEncoder};

    /// Photo `<n>.jpg` decodes to a frame with index `n`; anything else fails.
    fn numbered_loader(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let index: usize = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or("no file name")?
            .parse()?;
        Ok(Frame::new(vec![0u8; 3], 1, 1, 3, index))
    }

    fn use_case(
        records: Arc<InMemoryRecordStore>,
        script: &FaceScript,
    ) -> EnrollStudentUseCase {
        EnrollStudentUseCase::new(
            records,
            Box::new(ScriptedDetector(script.clone())),
            Box::new(ScriptedEncoder(script.clone())),
            numbered_loader,
        )
    }

    fn photos(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/photos/{n}"))).collect()
    }

    #[test]
    fn test_enrolls_first_face_of_each_photo() {
        let records = Arc::new(InMemoryRecordStore::new());
        let script = FaceScript::new()
            .with_faces(1, vec![vec![0.1], vec![0.9]])
            .with_faces(2, vec![vec![0.2]])
            .with_faces(3, vec![vec![0.3]]);

        let report = use_case(records.clone(), &script)
            .execute("10e01", "10ea", &photos(&["1.jpg", "2.jpg", "3.jpg"]))
            .unwrap();

        assert_eq!(report.embeddings, 3);
        assert!(report.skipped.is_empty());
        let student = records.find_student("10e01").unwrap().unwrap();
        assert_eq!(student.batch, "10ea");
        assert_eq!(student.embeddings, vec![vec![0.1], vec![0.2], vec![0.3]]);
    }

    #[test]
    fn test_unusable_photos_are_skipped() {
        let records = Arc::new(InMemoryRecordStore::new());
        let script = FaceScript::new().with_faces(1, vec![vec![0.1]]);

        let report = use_case(records.clone(), &script)
            .execute("10e01", "10ea", &photos(&["1.jpg", "2.jpg", "cover.jpg"]))
            .unwrap();

        assert_eq!(report.embeddings, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped[0].1.contains("no face"));
        assert!(report.skipped[1].1.contains("unreadable"));
    }

    #[test]
    fn test_student_without_faces_is_still_recorded() {
        let records = Arc::new(InMemoryRecordStore::new());
        let report = use_case(records.clone(), &FaceScript::new())
            .execute("10e01", "10ea", &photos(&["1.jpg"]))
            .unwrap();

        assert_eq!(report.embeddings, 0);
        let student = records.find_student("10e01").unwrap().unwrap();
        assert!(student.embeddings.is_empty());
    }

    #[test]
    fn test_duplicate_roll_rejected_before_encoding() {
        let records = Arc::new(InMemoryRecordStore::new());
        let script = FaceScript::new().with_faces(1, vec![vec![0.1]]);
        use_case(records.clone(), &script)
            .execute("10e01", "10ea", &photos(&["1.jpg"]))
            .unwrap();
        let calls = script.detect_calls();

        let result = use_case(records, &script).execute("10e01", "10ea", &photos(&["1.jpg"]));

        assert!(matches!(result, Err(EnrollError::DuplicateStudent(ref r)) if r == "10e01"));
        assert_eq!(script.detect_calls(), calls);
    }

    #[test]
    fn test_oracle_failure_aborts_enrollment() {
        let records = Arc::new(InMemoryRecordStore::new());
        let result = use_case(records.clone(), &FaceScript::new().failing())
            .execute("10e01", "10ea", &photos(&["1.jpg"]));

        assert!(matches!(result, Err(EnrollError::Oracle { .. })));
        assert!(records.find_student("10e01").unwrap().is_none());
    }

    #[test]
    fn test_blank_identity_rejected() {
        let records = Arc::new(InMemoryRecordStore::new());
        let result = use_case(records, &FaceScript::new()).execute("", "10ea", &[]);
        assert!(matches!(result, Err(EnrollError::MissingIdentity)));
    }
}
