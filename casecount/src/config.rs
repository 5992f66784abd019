//! Engine configuration.
//!
//! Configuration is plain data with serde support so it can live in a JSON
//! file next to the dataset. Every field has a default, so an empty object
//! (`{}`) is a valid configuration.
//!
//! ```json
//! {
//!   "worker_threads": 4,
//!   "clamp_negative_deltas": false,
//!   "countries": "countries.json"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the dedicated fan-out pool size.
const MAX_WORKER_THREADS: usize = 1024;

/// Configuration for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of a dedicated fan-out pool; `None` uses rayon's global pool.
    pub worker_threads: Option<usize>,

    /// Replace negative range deltas with zero.
    ///
    /// Cumulative source series should never decrease, but corrections
    /// upstream occasionally make them do so. Off by default: deltas are
    /// reported exactly as the data implies.
    pub clamp_negative_deltas: bool,

    /// JSON file of country entries extending the built-in directory.
    pub countries: Option<PathBuf>,
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `worker_threads` is zero or
    /// unreasonably large.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threads) = self.worker_threads {
            if threads == 0 {
                return Err(ConfigError::Invalid {
                    reason: "worker_threads must be > 0".to_string(),
                });
            }
            if threads > MAX_WORKER_THREADS {
                return Err(ConfigError::Invalid {
                    reason: format!("worker_threads {threads} exceeds maximum {MAX_WORKER_THREADS}"),
                });
            }
        }
        Ok(())
    }

    /// Loads and validates a configuration file.
    ///
    /// A relative `countries` path is resolved against the config file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        if let (Some(countries), Some(dir)) = (&config.countries, path.parent()) {
            if countries.is_relative() {
                config.countries = Some(dir.join(countries));
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_threads, None);
        assert!(!config.clamp_negative_deltas);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = EngineConfig {
            worker_threads: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_too_many_workers_rejected() {
        let config = EngineConfig {
            worker_threads: Some(MAX_WORKER_THREADS + 1),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_object_parses_to_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_resolves_countries_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"worker_threads": 2, "countries": "countries.json"}"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.countries, Some(dir.path().join("countries.json")));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"worker_threads": 0}"#).unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Invalid { .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
