pub mod in_memory_ledger;
pub mod json_file_ledger;
pub mod ledger_locks;
pub mod sheet_grid;
