use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Identifies one attendance sheet: a teacher's workbook tab for a batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerKey {
    pub teacher_id: String,
    pub batch: String,
}

impl LedgerKey {
    pub fn new(teacher_id: &str, batch: &str) -> Self {
        Self {
            teacher_id: teacher_id.to_string(),
            batch: batch.to_string(),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.teacher_id, self.batch)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell assignment. Rows and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellWrite {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

impl CellWrite {
    pub fn new(row: usize, col: usize, value: &str) -> Self {
        Self {
            row,
            col,
            value: value.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("invalid ledger key {0}")]
    InvalidKey(LedgerKey),
    #[error("I/O error on ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ledger {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cell ({row}, {col}) is out of bounds")]
    OutOfBounds { row: usize, col: usize },
    #[error("ledger lock poisoned")]
    Poisoned,
}

/// One attendance grid.
///
/// Reads return cell values with trailing empty cells trimmed, like a
/// spreadsheet API does. Interior empty cells are returned as `""`.
pub trait Sheet {
    fn header_row(&self) -> Result<Vec<String>, LedgerError>;

    /// Values of column `col` from row 1 down.
    fn column_values(&self, col: usize) -> Result<Vec<String>, LedgerError>;

    /// Applies every write or none of them.
    fn write_cells(&mut self, writes: &[CellWrite]) -> Result<(), LedgerError>;

    fn write_cell(&mut self, write: CellWrite) -> Result<(), LedgerError> {
        self.write_cells(std::slice::from_ref(&write))
    }
}

pub trait LedgerBackend: Send + Sync {
    /// Opens the sheet for `key`, creating an empty one if needed.
    fn open_sheet(&self, key: &LedgerKey) -> Result<Box<dyn Sheet + '_>, LedgerError>;
}
