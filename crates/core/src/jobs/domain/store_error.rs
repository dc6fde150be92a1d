use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed store file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("media not found: {0}")]
    MediaNotFound(String),
    #[error("invalid media name: {0:?}")]
    InvalidName(String),
    #[error("media request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{kind} already exists: {key}")]
    Duplicate { kind: &'static str, key: String },
}
