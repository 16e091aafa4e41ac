// Environment-driven configuration

use std::env;
use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_DATASET_PATH: &str = "data/credit_unions.db";
pub const DEFAULT_STATIC_DIR: &str = "data";
pub const DEFAULT_SOURCE_DIR: &str = ".";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Snapshot loaded at boot
    pub dataset_path: PathBuf,
    /// Served under `/data/*` by the HTTP front end
    pub static_dir: PathBuf,
    /// Where `import` looks for the CSV sources
    pub source_dir: PathBuf,
    pub port: u16,
    /// Log sink for the terminal browser; logs are discarded when unset
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            port: DEFAULT_PORT,
            log_file: None,
        }
    }
}

impl Config {
    /// Read the process environment; call `dotenvy::dotenv()` first
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let dataset_path = match read("CU_DATASET_PATH") {
            Some(path) => PathBuf::from(path),
            None => {
                warn!("CU_DATASET_PATH not set; defaulting to {}", DEFAULT_DATASET_PATH);
                PathBuf::from(DEFAULT_DATASET_PATH)
            }
        };

        let static_dir = read("CU_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let source_dir = read("CU_SOURCE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR));

        let port = match read("PORT") {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                warn!("PORT={} is not a valid port; defaulting to {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let log_file = read("CU_LOG_FILE").map(PathBuf::from);

        Self {
            dataset_path,
            static_dir,
            source_dir,
            port,
            log_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CU_DATASET_PATH", " /srv/cu.db "),
            ("CU_STATIC_DIR", "/srv/static"),
            ("PORT", "8080"),
            ("CU_LOG_FILE", "/tmp/cu.log"),
        ]));

        assert_eq!(config.dataset_path, PathBuf::from("/srv/cu.db"));
        assert_eq!(config.static_dir, PathBuf::from("/srv/static"));
        assert_eq!(config.source_dir, PathBuf::from("."));
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/cu.log")));
    }

    #[test]
    fn test_bad_port_and_blank_values_fall_back() {
        let config = Config::from_lookup(lookup(&[("PORT", "http"), ("CU_LOG_FILE", "  ")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_file, None);
    }
}
