use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::jobs::domain::media_store::MediaStore;
use crate::jobs::domain::store_error::StoreError;
use crate::shared::atomic_file::write_atomic;

/// Media store backed by a flat directory. References are file names.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, StoreError> {
        let valid = !reference.is_empty()
            && reference != "."
            && reference != ".."
            && !reference.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidName(reference.to_string()));
        }
        Ok(self.root.join(reference))
    }
}

impl MediaStore for FsMediaStore {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.path_for(name)?;
        write_atomic(&path, bytes).map_err(|source| StoreError::Io { path, source })?;
        log::debug!("Stored media {name} ({} bytes)", bytes.len());
        Ok(name.to_string())
    }

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(reference)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::MediaNotFound(reference.to_string()))
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn delete(&self, reference: &str) -> Result<(), StoreError> {
        let path = self.path_for(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
