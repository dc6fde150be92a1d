use std::collections::{BTreeSet, HashSet};

use crate::attendance::domain::ledger::{AttendanceStatus, CellWrite, LedgerError, Sheet};
use crate::shared::constants::ROLL_HEADER;

/// What a merge changed in the sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// 1-based column holding the merged date.
    pub date_column: usize,
    pub date_column_created: bool,
    pub appended_rolls: Vec<String>,
    pub present: usize,
    pub absent: usize,
}

/// Folds one day's detections into a roll × date attendance grid.
///
/// Row 1 is the header: `Roll Number` followed by one date per column.
/// Column 1 holds one roll per row. Both axes only ever grow, and merging
/// the same `(date, detected)` twice leaves the grid unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttendanceLedgerMerger;

impl AttendanceLedgerMerger {
    pub fn new() -> Self {
        Self
    }

    /// Marks every roll in the sheet `Present` or `Absent` for `date`.
    ///
    /// Detected rolls missing from the sheet are appended in sorted order.
    /// Blank cells in the roll column are left alone. All writes, including
    /// any header repair, go to the sheet as a single batch.
    pub fn merge(
        &self,
        sheet: &mut dyn Sheet,
        date: &str,
        detected: &BTreeSet<String>,
    ) -> Result<MergeOutcome, LedgerError> {
        let header = sheet.header_row()?;
        let mut writes = header_repair(&header);

        let (date_column, date_column_created) =
            match header.iter().skip(1).position(|cell| cell == date) {
                Some(offset) => (offset + 2, false),
                None => (header.len().max(1) + 1, true),
            };
        if date_column_created {
            writes.push(CellWrite::new(1, date_column, date));
        }

        let mut rolls = sheet.column_values(1)?;
        let appended = append_missing(&mut rolls, detected.iter(), &mut writes);

        let mut present = 0;
        let mut absent = 0;
        for (offset, roll) in rolls.iter().enumerate().skip(1) {
            if roll.trim().is_empty() {
                continue;
            }
            let status = if detected.contains(roll) {
                present += 1;
                AttendanceStatus::Present
            } else {
                absent += 1;
                AttendanceStatus::Absent
            };
            writes.push(CellWrite::new(offset + 1, date_column, status.as_str()));
        }

        sheet.write_cells(&writes)?;
        Ok(MergeOutcome {
            date_column,
            date_column_created,
            appended_rolls: appended,
            present,
            absent,
        })
    }

    /// Ensures the header and appends `rolls` not yet in the sheet.
    ///
    /// Returns the rolls that were appended.
    pub fn seed_roster(
        &self,
        sheet: &mut dyn Sheet,
        rolls: &[String],
    ) -> Result<Vec<String>, LedgerError> {
        let header = sheet.header_row()?;
        let mut writes = header_repair(&header);
        let mut existing = sheet.column_values(1)?;
        let appended = append_missing(&mut existing, rolls.iter(), &mut writes);
        if !writes.is_empty() {
            sheet.write_cells(&writes)?;
        }
        Ok(appended)
    }
}

fn header_repair(header: &[String]) -> Vec<CellWrite> {
    if header.first().map(String::as_str) == Some(ROLL_HEADER) {
        Vec::new()
    } else {
        vec![CellWrite::new(1, 1, ROLL_HEADER)]
    }
}

/// Queues a row for every roll not already in `column`, extending `column`
/// to match. `column[0]` is the header cell.
fn append_missing<'a>(
    column: &mut Vec<String>,
    rolls: impl Iterator<Item = &'a String>,
    writes: &mut Vec<CellWrite>,
) -> Vec<String> {
    if column.is_empty() {
        column.push(String::new());
    }
    let mut known: HashSet<String> = column.iter().skip(1).cloned().collect();

    let mut appended = Vec::new();
    for roll in rolls {
        if roll.trim().is_empty() || !known.insert(roll.clone()) {
            continue;
        }
        column.push(roll.clone());
        writes.push(CellWrite::new(column.len(), 1, roll));
        appended.push(roll.clone());
    }
    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::domain::ledger::{LedgerBackend, LedgerKey};
    use crate::attendance::infrastructure::in_memory_ledger::InMemoryLedger;
    use crate::attendance::infrastructure::sheet_grid::SheetGrid;

    fn key() -> LedgerKey {
        LedgerKey::new("t1", "10ea")
    }

    fn set(rolls: &[&str]) -> BTreeSet<String> {
        rolls.iter().map(|r| r.to_string()).collect()
    }

    fn merge(ledger: &InMemoryLedger, date: &str, detected: &[&str]) -> MergeOutcome {
        let mut sheet = ledger.open_sheet(&key()).unwrap();
        AttendanceLedgerMerger::new()
            .merge(sheet.as_mut(), date, &set(detected))
            .unwrap()
    }

    fn grid(ledger: &InMemoryLedger) -> SheetGrid {
        ledger.snapshot(&key()).unwrap()
    }

    #[test]
    fn test_merge_into_empty_sheet() {
        let ledger = InMemoryLedger::new();

        let outcome = merge(&ledger, "2024-03-01", &["10e02", "10e01"]);

        assert_eq!(outcome.date_column, 2);
        assert!(outcome.date_column_created);
        assert_eq!(outcome.appended_rolls, vec!["10e01", "10e02"]);
        assert_eq!(
            grid(&ledger).rows(),
            &[
                vec!["Roll Number", "2024-03-01"],
                vec!["10e01", "Present"],
                vec!["10e02", "Present"],
            ]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let ledger = InMemoryLedger::new();
        merge(&ledger, "2024-03-01", &["10e01"]);
        let first = grid(&ledger);

        let outcome = merge(&ledger, "2024-03-01", &["10e01"]);

        assert_eq!(grid(&ledger), first);
        assert!(!outcome.date_column_created);
        assert!(outcome.appended_rolls.is_empty());
    }

    #[test]
    fn test_new_date_appends_column_and_keeps_old() {
        let ledger = InMemoryLedger::new();
        merge(&ledger, "2024-03-01", &["10e01", "10e02"]);

        let outcome = merge(&ledger, "2024-03-02", &["10e02"]);

        assert_eq!(outcome.date_column, 3);
        let grid = grid(&ledger);
        assert_eq!(grid.row_values(1), vec!["Roll Number", "2024-03-01", "2024-03-02"]);
        assert_eq!(grid.cell(2, 2), "Present");
        assert_eq!(grid.cell(2, 3), "Absent");
        assert_eq!(grid.cell(3, 3), "Present");
    }

    #[test]
    fn test_existing_rolls_default_to_absent() {
        let ledger = InMemoryLedger::new();
        {
            let mut sheet = ledger.open_sheet(&key()).unwrap();
            AttendanceLedgerMerger::new()
                .seed_roster(sheet.as_mut(), &["10e01".to_string(), "10e02".to_string()])
                .unwrap();
        }

        let outcome = merge(&ledger, "2024-03-01", &[]);

        assert_eq!((outcome.present, outcome.absent), (0, 2));
        assert_eq!(grid(&ledger).column_values(2), vec!["2024-03-01", "Absent", "Absent"]);
    }

    #[test]
    fn test_wrong_sentinel_is_repaired() {
        let ledger = InMemoryLedger::new();
        {
            let mut sheet = ledger.open_sheet(&key()).unwrap();
            sheet
                .write_cells(&[
                    CellWrite::new(1, 1, "Roll number"),
                    CellWrite::new(2, 1, "10e01"),
                ])
                .unwrap();
        }

        merge(&ledger, "2024-03-01", &["10e01"]);

        assert_eq!(grid(&ledger).cell(1, 1), "Roll Number");
        assert_eq!(grid(&ledger).cell(2, 2), "Present");
    }

    #[test]
    fn test_date_matching_header_cell_one_is_not_reused() {
        let ledger = InMemoryLedger::new();
        merge(&ledger, "Roll Number", &["10e01"]);
        assert_eq!(grid(&ledger).row_values(1), vec!["Roll Number", "Roll Number"]);
    }

    #[test]
    fn test_blank_roll_cells_are_skipped() {
        let ledger = InMemoryLedger::new();
        {
            let mut sheet = ledger.open_sheet(&key()).unwrap();
            sheet
                .write_cells(&[
                    CellWrite::new(1, 1, "Roll Number"),
                    CellWrite::new(2, 1, "10e01"),
                    CellWrite::new(4, 1, "10e03"),
                ])
                .unwrap();
        }

        let outcome = merge(&ledger, "2024-03-01", &["10e03"]);

        let grid = grid(&ledger);
        assert_eq!(grid.cell(3, 2), "");
        assert_eq!(grid.cell(4, 2), "Present");
        assert_eq!((outcome.present, outcome.absent), (1, 1));
    }

    #[test]
    fn test_seed_roster_skips_existing() {
        let ledger = InMemoryLedger::new();
        let merger = AttendanceLedgerMerger::new();
        let mut sheet = ledger.open_sheet(&key()).unwrap();
        let rolls: Vec<String> = ["10e01", "10e02"].iter().map(|r| r.to_string()).collect();

        assert_eq!(merger.seed_roster(sheet.as_mut(), &rolls).unwrap(), rolls);
        assert!(merger.seed_roster(sheet.as_mut(), &rolls).unwrap().is_empty());
        drop(sheet);

        assert_eq!(
            grid(&ledger).column_values(1),
            vec!["Roll Number", "10e01", "10e02"]
        );
    }

    struct ReadOnlySheet;

    impl Sheet for ReadOnlySheet {
        fn header_row(&self) -> Result<Vec<String>, LedgerError> {
            Ok(Vec::new())
        }

        fn column_values(&self, _col: usize) -> Result<Vec<String>, LedgerError> {
            Ok(Vec::new())
        }

        fn write_cells(&mut self, _writes: &[CellWrite]) -> Result<(), LedgerError> {
            Err(LedgerError::Unavailable("read-only".to_string()))
        }
    }

    #[test]
    fn test_write_failure_surfaces_as_error() {
        let result =
            AttendanceLedgerMerger::new().merge(&mut ReadOnlySheet, "2024-03-01", &set(&["10e01"]));
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
    }
}
