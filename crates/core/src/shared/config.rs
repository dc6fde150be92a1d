use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::face_matcher::MatchPolicy;
use crate::sampling::frame_sampler::FrameSampler;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LEASE_SECS, DEFAULT_SAMPLE_FLOOR,
    DEFAULT_SAMPLE_RATE, DEFAULT_SCAN_BUDGET_SECS, DEFAULT_TOLERANCE, DEFAULT_UTC_OFFSET_MINUTES,
    WORKING_HEIGHT, WORKING_WIDTH,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the attendance service.
///
/// Stored as JSON; fields missing from the file take their defaults so
/// older config files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub tolerance: f64,
    pub match_policy: MatchPolicy,
    pub sample_rate: f64,
    pub sample_floor: usize,
    pub working_width: u32,
    pub working_height: u32,
    pub utc_offset_minutes: i32,
    /// Worker threads; 0 means one per available CPU.
    pub workers: usize,
    pub scan_budget_secs: u64,
    pub lease_secs: u64,
    pub fetch_timeout_secs: u64,
    pub detector_confidence: f64,
    /// Remote media endpoint. Local filesystem storage when unset.
    pub media_base_url: Option<String>,
    pub model_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            match_policy: MatchPolicy::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_floor: DEFAULT_SAMPLE_FLOOR,
            working_width: WORKING_WIDTH,
            working_height: WORKING_HEIGHT,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            workers: 0,
            scan_budget_secs: DEFAULT_SCAN_BUDGET_SECS,
            lease_secs: DEFAULT_LEASE_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            detector_confidence: 0.5,
            media_base_url: None,
            model_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Default location: `<config dir>/Clara/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    /// Loads the config at `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.working_width == 0 || self.working_height == 0 {
            return Err(ConfigError::Invalid(
                "working resolution must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )));
        }
        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn sampler(&self) -> FrameSampler {
        FrameSampler::new(self.sample_rate, self.sample_floor)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn scan_budget(&self) -> Duration {
        Duration::from_secs(self.scan_budget_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.tolerance, 0.4);
        assert_eq!(config.match_policy, MatchPolicy::FirstWithinTolerance);
        assert_eq!(config.sample_floor, 10);
        assert_eq!((config.working_width, config.working_height), (960, 540));
        assert_eq!(config.timezone().unwrap().local_minus_utc(), 330 * 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig::load(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"tolerance": 0.5, "match_policy": "nearest"}"#).unwrap();

        let config = ServiceConfig::load(&path).unwrap();

        assert_eq!(config.tolerance, 0.5);
        assert_eq!(config.match_policy, MatchPolicy::Nearest);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = ServiceConfig {
            workers: 3,
            media_base_url: Some("http://media.local/videos".to_string()),
            ..ServiceConfig::default()
        };

        config.save(&path).unwrap();

        assert_eq!(ServiceConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServiceConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_tolerance = ServiceConfig {
            tolerance: 0.0,
            ..ServiceConfig::default()
        };
        assert!(bad_tolerance.validate().is_err());

        let bad_offset = ServiceConfig {
            utc_offset_minutes: 24 * 60,
            ..ServiceConfig::default()
        };
        assert!(bad_offset.validate().is_err());
    }

    #[test]
    fn test_worker_count_defaults_to_cpus() {
        assert!(ServiceConfig::default().worker_count() >= 1);
        let fixed = ServiceConfig {
            workers: 2,
            ..ServiceConfig::default()
        };
        assert_eq!(fixed.worker_count(), 2);
    }
}
