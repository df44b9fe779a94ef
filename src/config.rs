use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Application configuration
/// In debug builds: loads .env first, then reads the environment
#[derive(Clone, Debug)]
pub struct Config {
    /// How often the playback service emits progress while playing.
    /// Progress advances by the same number of milliseconds per emission.
    pub progress_interval: Duration,
    /// Where the session snapshot is written on teardown
    pub snapshot_path: PathBuf,
    /// Optional JSON catalog to load at startup
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            snapshot_path: default_snapshot_path(),
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: Dev mode activated - loaded .env file");
            } else {
                info!("Config: No .env file found, using environment only");
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup("BOOKSHELF_PROGRESS_INTERVAL_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "BOOKSHELF_PROGRESS_INTERVAL_MS",
                    value: raw.clone(),
                })?;
            config.progress_interval = Duration::from_millis(millis);
        }

        if let Some(path) = lookup("BOOKSHELF_SNAPSHOT_PATH") {
            config.snapshot_path = PathBuf::from(path);
        }

        config.catalog_path = lookup("BOOKSHELF_CATALOG_PATH").map(PathBuf::from);

        info!(
            "Config: progress every {:?}, snapshot at {}",
            config.progress_interval,
            config.snapshot_path.display()
        );

        Ok(config)
    }
}

/// ~/.bookshelf/session.json, or a relative path when there is no home directory
fn default_snapshot_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bookshelf"))
        .unwrap_or_else(|| PathBuf::from(".bookshelf"))
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.progress_interval, Duration::from_millis(1000));
        assert!(config.snapshot_path.ends_with("session.json"));
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOOKSHELF_PROGRESS_INTERVAL_MS", "250"),
            ("BOOKSHELF_SNAPSHOT_PATH", "/tmp/snap.json"),
            ("BOOKSHELF_CATALOG_PATH", "/tmp/books.json"),
        ]))
        .unwrap();

        assert_eq!(config.progress_interval, Duration::from_millis(250));
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/snap.json"));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/books.json")));
    }

    #[test]
    fn test_rejects_zero_and_garbage_interval() {
        for raw in ["0", "fast"] {
            let err = Config::from_lookup(lookup_from(&[("BOOKSHELF_PROGRESS_INTERVAL_MS", raw)]))
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidValue {
                    key: "BOOKSHELF_PROGRESS_INTERVAL_MS",
                    value: raw.to_string(),
                }
            );
        }
    }
}
