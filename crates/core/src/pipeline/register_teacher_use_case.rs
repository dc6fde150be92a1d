use std::sync::Arc;

use thiserror::Error;

use crate::attendance::domain::ledger::{LedgerBackend, LedgerError, LedgerKey};
use crate::attendance::domain::ledger_merger::AttendanceLedgerMerger;
use crate::attendance::domain::roster::roster_for_class;
use crate::attendance::infrastructure::ledger_locks::LedgerLocks;
use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::student::TeacherRecord;

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("teacher {0} is already registered")]
    DuplicateTeacher(String),
    #[error("teacher id must not be empty")]
    MissingId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterReport {
    /// Class codes whose sheet was prepared, with the number of rolls added.
    pub seeded: Vec<(String, usize)>,
    /// Class codes whose roster could not be derived or written, with why.
    pub rejected: Vec<(String, String)>,
}

/// Records a teacher and prepares one attendance sheet per class they teach.
///
/// Every sheet gets its header. Classes with a recognised code also get
/// their full roster, so students who are never detected still show up as
/// absent. A bad class code does not stop the other classes.
pub struct RegisterTeacherUseCase {
    records: Arc<dyn RecordStore>,
    ledgers: Arc<dyn LedgerBackend>,
    locks: Arc<LedgerLocks>,
    merger: AttendanceLedgerMerger,
}

impl RegisterTeacherUseCase {
    pub fn new(
        records: Arc<dyn RecordStore>,
        ledgers: Arc<dyn LedgerBackend>,
        locks: Arc<LedgerLocks>,
    ) -> Self {
        Self {
            records,
            ledgers,
            locks,
            merger: AttendanceLedgerMerger::new(),
        }
    }

    pub fn execute(
        &self,
        teacher_id: &str,
        name: &str,
        classes: &[String],
    ) -> Result<RegisterReport, RegisterError> {
        if teacher_id.trim().is_empty() {
            return Err(RegisterError::MissingId);
        }
        self.records
            .insert_teacher(TeacherRecord {
                teacher_id: teacher_id.to_string(),
                name: name.to_string(),
            })
            .map_err(|e| match e {
                StoreError::Duplicate { key, .. } => RegisterError::DuplicateTeacher(key),
                other => RegisterError::Store(other),
            })?;
        log::info!("Registered teacher {teacher_id} ({name})");

        let mut report = RegisterReport::default();
        for class in classes {
            let key = LedgerKey::new(teacher_id, class);
            let rolls = match roster_for_class(class) {
                Ok(rolls) => rolls,
                Err(e) => {
                    log::warn!("No roster for {class}: {e}");
                    report.rejected.push((class.clone(), e.to_string()));
                    Vec::new()
                }
            };
            match self.seed(&key, &rolls) {
                Ok(added) if !rolls.is_empty() => {
                    log::info!("Prepared sheet {key} with {added} rolls");
                    report.seeded.push((class.clone(), added));
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("Could not prepare sheet {key}: {e}");
                    report.rejected.push((class.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn seed(&self, key: &LedgerKey, rolls: &[String]) -> Result<usize, LedgerError> {
        let lock = self.locks.lock_for(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut sheet = self.ledgers.open_sheet(key)?;
        let appended = self.merger.seed_roster(sheet.as_mut(), rolls)?;
        Ok(appended.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::infrastructure::in_memory_ledger::InMemoryLedger;
    use crate::jobs::infrastructure::in_memory_record_store::InMemoryRecordStore;

    fn setup() -> (Arc<InMemoryRecordStore>, Arc<InMemoryLedger>, RegisterTeacherUseCase) {
        let records = Arc::new(InMemoryRecordStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let use_case =
            RegisterTeacherUseCase::new(records.clone(), ledger.clone(), Arc::new(LedgerLocks::new()));
        (records, ledger, use_case)
    }

    fn classes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_registers_teacher_and_seeds_rosters() {
        let (records, ledger, use_case) = setup();

        let report = use_case
            .execute("t1", "A. Sharma", &classes(&["9ea", "10fb"]))
            .unwrap();

        assert_eq!(
            report.seeded,
            vec![("9ea".to_string(), 23), ("10fb".to_string(), 23)]
        );
        assert!(report.rejected.is_empty());
        assert_eq!(records.find_teacher("t1").unwrap().unwrap().name, "A. Sharma");

        let sheet = ledger.snapshot(&LedgerKey::new("t1", "10fb")).unwrap();
        assert_eq!(sheet.cell(1, 1), "Roll Number");
        assert_eq!(sheet.cell(2, 1), "101b24");
        assert_eq!(sheet.column_values(1).len(), 24);
    }

    #[test]
    fn test_bad_class_code_gets_header_only() {
        let (_, ledger, use_case) = setup();

        let report = use_case
            .execute("t1", "A. Sharma", &classes(&["9za", "9ea"]))
            .unwrap();

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "9za");
        assert_eq!(report.seeded.len(), 1);
        let sheet = ledger.snapshot(&LedgerKey::new("t1", "9za")).unwrap();
        assert_eq!(sheet.row_values(1), vec!["Roll Number"]);
        assert_eq!(sheet.column_values(1).len(), 1);
    }

    #[test]
    fn test_duplicate_teacher_rejected() {
        let (_, _, use_case) = setup();
        use_case.execute("t1", "A. Sharma", &[]).unwrap();
        assert!(matches!(
            use_case.execute("t1", "B. Rao", &[]),
            Err(RegisterError::DuplicateTeacher(ref t)) if t == "t1"
        ));
    }

    #[test]
    fn test_seeding_twice_adds_nothing() {
        let (_, ledger, use_case) = setup();
        use_case.execute("t1", "A. Sharma", &classes(&["9ea"])).unwrap();

        let added = use_case
            .seed(&LedgerKey::new("t1", "9ea"), &roster_for_class("9ea").unwrap())
            .unwrap();

        assert_eq!(added, 0);
        let sheet = ledger.snapshot(&LedgerKey::new("t1", "9ea")).unwrap();
        assert_eq!(sheet.column_values(1).len(), 24);
    }
}
