use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::jobs::domain::media_store::MediaStore;
use crate::jobs::domain::store_error::StoreError;

/// Media store held in process memory. References are the upload names.
#[derive(Default)]
pub struct InMemoryMediaStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.objects()
            .map(|objects| objects.contains_key(reference))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.objects.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl MediaStore for InMemoryMediaStore {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        self.objects()?.insert(name.to_string(), bytes.to_vec());
        Ok(name.to_string())
    }

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        self.objects()?
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::MediaNotFound(reference.to_string()))
    }

    fn delete(&self, reference: &str) -> Result<(), StoreError> {
        self.objects()?.remove(reference);
        Ok(())
    }
}
