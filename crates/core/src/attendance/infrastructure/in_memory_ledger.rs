use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::attendance::domain::ledger::{CellWrite, LedgerBackend, LedgerError, LedgerKey, Sheet};

use super::sheet_grid::SheetGrid;

/// Ledger backend holding every sheet in memory.
///
/// Sheets opened for the same key share one grid; each read and each batch
/// write is atomic with respect to the others.
#[derive(Default)]
pub struct InMemoryLedger {
    sheets: Mutex<HashMap<LedgerKey, Arc<Mutex<SheetGrid>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the grid for `key`, if the sheet was ever opened.
    pub fn snapshot(&self, key: &LedgerKey) -> Option<SheetGrid> {
        let sheets = self.sheets.lock().ok()?;
        let grid = sheets.get(key)?.lock().ok()?;
        Some(grid.clone())
    }
}

impl LedgerBackend for InMemoryLedger {
    fn open_sheet(&self, key: &LedgerKey) -> Result<Box<dyn Sheet + '_>, LedgerError> {
        let mut sheets = self.sheets.lock().map_err(|_| LedgerError::Poisoned)?;
        let grid = sheets.entry(key.clone()).or_default().clone();
        Ok(Box::new(InMemorySheet { grid }))
    }
}

struct InMemorySheet {
    grid: Arc<Mutex<SheetGrid>>,
}

impl Sheet for InMemorySheet {
    fn header_row(&self) -> Result<Vec<String>, LedgerError> {
        let grid = self.grid.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(grid.row_values(1))
    }

    fn column_values(&self, col: usize) -> Result<Vec<String>, LedgerError> {
        let grid = self.grid.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(grid.column_values(col))
    }

    fn write_cells(&mut self, writes: &[CellWrite]) -> Result<(), LedgerError> {
        let mut grid = self.grid.lock().map_err(|_| LedgerError::Poisoned)?;
        grid.apply(writes)
    }
}
