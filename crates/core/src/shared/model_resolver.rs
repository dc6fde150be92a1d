use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolves a model file by name, downloading it on first use.
///
/// Looks in `model_dir` when given, otherwise in the platform cache
/// directory.
pub fn resolve(
    name: &str,
    url: &str,
    model_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None => model_cache_dir()?,
    };
    resolve_in(&dir, name, url, progress)
}

/// Returns `dir/name`, downloading `url` there if the file is missing.
pub fn resolve_in(
    dir: &Path,
    name: &str,
    url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let path = dir.join(name);
    if path.exists() {
        return Ok(path);
    }

    log::info!("Model {name} not cached, downloading from {url}");
    fs::create_dir_all(dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &path, progress)?;
    Ok(path)
}

/// Platform-specific model cache directory.
///
/// - Linux: `$XDG_CACHE_HOME/Clara/models/` or `~/.cache/Clara/models/`
/// - macOS: `~/Library/Caches/Clara/models/`
/// - Windows: `%LOCALAPPDATA%/Clara/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    // Models are 100MB+; stream instead of buffering the body.
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_in_returns_existing_file_without_download() {
        let tmp = TempDir::new().unwrap();
        let model_path = tmp.path().join("detector.onnx");
        fs::write(&model_path, b"fake model data").unwrap();

        let resolved = resolve_in(
            tmp.path(),
            "detector.onnx",
            "http://invalid.nonexistent.example.com/detector.onnx",
            None,
        )
        .unwrap();

        assert_eq!(resolved, model_path);
    }

    #[test]
    fn test_resolve_uses_explicit_model_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("encoder.onnx"), b"weights").unwrap();

        let resolved = resolve(
            "encoder.onnx",
            "http://invalid.nonexistent.example.com/encoder.onnx",
            Some(tmp.path()),
            None,
        )
        .unwrap();

        assert_eq!(fs::read(resolved).unwrap(), b"weights");
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let result = resolve_in(
            tmp.path(),
            "model.onnx",
            "http://invalid.nonexistent.example.com/model",
            None,
        );
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!tmp.path().join("model.onnx").exists());
        assert!(!tmp.path().join("model.part").exists());
    }
}
