use crate::jobs::domain::store_error::StoreError;

/// Remote storage for uploaded classroom videos.
///
/// References returned by [`upload`](MediaStore::upload) are opaque to
/// callers. Deleting a reference that no longer exists succeeds.
pub trait MediaStore: Send + Sync {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError>;

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError>;

    fn delete(&self, reference: &str) -> Result<(), StoreError>;
}
