use std::fs;
use std::path::{Path, PathBuf};

use crate::attendance::domain::ledger::{CellWrite, LedgerBackend, LedgerError, LedgerKey, Sheet};
use crate::shared::atomic_file::write_atomic;

use super::sheet_grid::SheetGrid;

/// Ledger backend storing one JSON grid per sheet at
/// `<root>/<teacher_id>/<batch>.json`.
///
/// A sheet reads the file once when opened; callers serialize merges on the
/// same key with [`LedgerLocks`](super::ledger_locks::LedgerLocks).
pub struct JsonFileLedger {
    root: PathBuf,
}

impl JsonFileLedger {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &LedgerKey) -> Result<PathBuf, LedgerError> {
        if !is_safe_component(&key.teacher_id) || !is_safe_component(&key.batch) {
            return Err(LedgerError::InvalidKey(key.clone()));
        }
        Ok(self
            .root
            .join(&key.teacher_id)
            .join(format!("{}.json", key.batch)))
    }
}

fn is_safe_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

impl LedgerBackend for JsonFileLedger {
    fn open_sheet(&self, key: &LedgerKey) -> Result<Box<dyn Sheet + '_>, LedgerError> {
        let path = self.path_for(key)?;
        let grid = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| LedgerError::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SheetGrid::default(),
            Err(source) => return Err(LedgerError::Io { path, source }),
        };
        Ok(Box::new(JsonFileSheet { path, grid }))
    }
}

struct JsonFileSheet {
    path: PathBuf,
    grid: SheetGrid,
}

impl Sheet for JsonFileSheet {
    fn header_row(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.grid.row_values(1))
    }

    fn column_values(&self, col: usize) -> Result<Vec<String>, LedgerError> {
        Ok(self.grid.column_values(col))
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> Result<(), LedgerError> {
        let mut next = self.grid.clone();
        next.apply(writes)?;
        let json = serde_json::to_vec_pretty(&next).map_err(|source| LedgerError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.grid = next;
        Ok(())
    }
}
