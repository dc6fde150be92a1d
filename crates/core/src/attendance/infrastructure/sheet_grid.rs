use serde::{Deserialize, Serialize};

use crate::attendance::domain::ledger::{CellWrite, LedgerError};

/// Dense row-major grid of cell strings. Rows may have different lengths;
/// missing cells read as `""`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetGrid {
    rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        row.checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .and_then(|cells| col.checked_sub(1).and_then(|c| cells.get(c)))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn row_values(&self, row: usize) -> Vec<String> {
        let cells = row
            .checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .cloned()
            .unwrap_or_default();
        trim_trailing_empty(cells)
    }

    pub fn column_values(&self, col: usize) -> Vec<String> {
        let cells = (1..=self.rows.len())
            .map(|row| self.cell(row, col).to_string())
            .collect();
        trim_trailing_empty(cells)
    }

    /// Validates every write before touching the grid.
    pub fn apply(&mut self, writes: &[CellWrite]) -> Result<(), LedgerError> {
        if let Some(bad) = writes.iter().find(|w| w.row == 0 || w.col == 0) {
            return Err(LedgerError::OutOfBounds {
                row: bad.row,
                col: bad.col,
            });
        }
        for write in writes {
            if self.rows.len() < write.row {
                self.rows.resize_with(write.row, Vec::new);
            }
            let cells = &mut self.rows[write.row - 1];
            if cells.len() < write.col {
                cells.resize(write.col, String::new());
            }
            cells[write.col - 1] = write.value.clone();
        }
        Ok(())
    }
}

fn trim_trailing_empty(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}
