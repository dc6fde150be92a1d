use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::attendance::domain::ledger::LedgerKey;

/// One mutex per ledger, so merges into the same sheet run one at a time
/// while different sheets proceed in parallel.
#[derive(Default)]
pub struct LedgerLocks {
    locks: Mutex<HashMap<LedgerKey, Arc<Mutex<()>>>>,
}

impl LedgerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, key: &LedgerKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }
}
