use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::jobs::domain::media_store::MediaStore;
use crate::jobs::domain::store_error::StoreError;

/// Media store speaking plain HTTP against `<base_url>/<name>`.
///
/// `PUT` uploads, `GET` fetches and `DELETE` removes. A `404` on delete is
/// treated as already deleted.
pub struct HttpMediaStore {
    base_url: String,
    client: Client,
}

impl HttpMediaStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url_for(&self, reference: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(reference))
    }
}

impl MediaStore for HttpMediaStore {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let url = self.url_for(name);
        log::debug!("PUT {url} ({} bytes)", bytes.len());
        self.client
            .put(&url)
            .body(bytes.to_vec())
            .send()?
            .error_for_status()?;
        Ok(name.to_string())
    }

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url_for(reference);
        let response = self.client.get(&url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::MediaNotFound(reference.to_string()));
        }
        let bytes = response.error_for_status()?.bytes()?;
        Ok(bytes.to_vec())
    }

    fn delete(&self, reference: &str) -> Result<(), StoreError> {
        let response = self.client.delete(self.url_for(reference)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }
}
