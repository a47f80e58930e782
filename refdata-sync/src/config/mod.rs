//! Environment configuration for the reference data sync binary.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use refdata_cache::CoordinatorConfig;
use refdata_pipeline::sources::CoordinateMode;

use crate::SyncError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Redis URL.
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default directory of the local JSON data types.
const DEFAULT_LOCAL_DIR: &str = "./resources/local-refdata";

/// Default organization CSV.
const DEFAULT_ORGANIZATION_CSV: &str = "./resources/organizations/organizations.csv";

/// Default pre-baked coordinate file.
const DEFAULT_COORDINATES_FILE: &str = "./resources/uri_to_wkt.json";

/// Default vocabulary service base URL.
const DEFAULT_FINTO_URL: &str = "https://finto.fi/rest/v1";

/// Default media type registry document.
const DEFAULT_MEDIA_TYPES_URL: &str =
    "https://www.iana.org/assignments/media-types/media-types.xml";

const DEFAULT_STARTUP_LOCK_TTL_SECS: u64 = 120;
const DEFAULT_RELOAD_FLAG_TTL_SECS: u64 = 120;
const DEFAULT_STARTUP_GRACE_MS: u64 = 2000;
const DEFAULT_READ_MAX_RETRIES: u32 = 5;
const DEFAULT_READ_RETRY_INTERVAL_MS: u64 = 2000;

/// Settings of one `refdata-sync` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub opensearch_url: String,
    pub redis_url: String,
    pub local_dir: PathBuf,
    pub organization_csv: PathBuf,
    pub coordinates_file: PathBuf,
    pub coordinate_mode: CoordinateMode,
    pub finto_url: String,
    pub media_types_url: String,
    /// Remote organization registry. Only the reconcile command needs it.
    pub organization_api_url: Option<String>,
    pub coordinator: CoordinatorConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            organization_csv: PathBuf::from(DEFAULT_ORGANIZATION_CSV),
            coordinates_file: PathBuf::from(DEFAULT_COORDINATES_FILE),
            coordinate_mode: CoordinateMode::File,
            finto_url: DEFAULT_FINTO_URL.to_string(),
            media_types_url: DEFAULT_MEDIA_TYPES_URL.to_string(),
            organization_api_url: None,
            coordinator: CoordinatorConfig {
                startup_lock_ttl: Duration::from_secs(DEFAULT_STARTUP_LOCK_TTL_SECS),
                reload_flag_ttl: Duration::from_secs(DEFAULT_RELOAD_FLAG_TTL_SECS),
                startup_grace: Duration::from_millis(DEFAULT_STARTUP_GRACE_MS),
                force_reload: false,
                read_max_retries: DEFAULT_READ_MAX_RETRIES,
                read_retry_interval: Duration::from_millis(DEFAULT_READ_RETRY_INTERVAL_MS),
            },
        }
    }
}

impl SyncConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`, `REDIS_URL`: service endpoints
    /// - `REFDATA_LOCAL_DIR`, `REFDATA_ORGANIZATION_CSV`, `REFDATA_COORDINATES_FILE`: local inputs
    /// - `REFDATA_COORDINATE_MODE`: `file` (default) or `live`
    /// - `REFDATA_FINTO_URL`, `REFDATA_MEDIA_TYPES_URL`, `REFDATA_ORGANIZATION_API_URL`:
    ///   upstream sources
    /// - `REFDATA_FORCE_RELOAD`, `REFDATA_STARTUP_LOCK_TTL_SECS`, `REFDATA_RELOAD_FLAG_TTL_SECS`,
    ///   `REFDATA_STARTUP_GRACE_MS`, `REFDATA_READ_MAX_RETRIES`, `REFDATA_READ_RETRY_INTERVAL_MS`:
    ///   cache coordination
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let coordinate_mode = match var("REFDATA_COORDINATE_MODE") {
            Some(raw) => CoordinateMode::from_str(&raw)?,
            None => defaults.coordinate_mode,
        };

        let coordinator = CoordinatorConfig {
            startup_lock_ttl: duration_secs(&var, "REFDATA_STARTUP_LOCK_TTL_SECS")?
                .unwrap_or(defaults.coordinator.startup_lock_ttl),
            reload_flag_ttl: duration_secs(&var, "REFDATA_RELOAD_FLAG_TTL_SECS")?
                .unwrap_or(defaults.coordinator.reload_flag_ttl),
            startup_grace: duration_millis(&var, "REFDATA_STARTUP_GRACE_MS")?
                .unwrap_or(defaults.coordinator.startup_grace),
            force_reload: match var("REFDATA_FORCE_RELOAD") {
                Some(raw) => parse_bool("REFDATA_FORCE_RELOAD", &raw)?,
                None => defaults.coordinator.force_reload,
            },
            read_max_retries: parse_number(&var, "REFDATA_READ_MAX_RETRIES")?
                .unwrap_or(defaults.coordinator.read_max_retries),
            read_retry_interval: duration_millis(&var, "REFDATA_READ_RETRY_INTERVAL_MS")?
                .unwrap_or(defaults.coordinator.read_retry_interval),
        };

        Ok(Self {
            opensearch_url: var("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url),
            redis_url: var("REDIS_URL").unwrap_or(defaults.redis_url),
            local_dir: var("REFDATA_LOCAL_DIR").map(PathBuf::from).unwrap_or(defaults.local_dir),
            organization_csv: var("REFDATA_ORGANIZATION_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.organization_csv),
            coordinates_file: var("REFDATA_COORDINATES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.coordinates_file),
            coordinate_mode,
            finto_url: var("REFDATA_FINTO_URL").unwrap_or(defaults.finto_url),
            media_types_url: var("REFDATA_MEDIA_TYPES_URL").unwrap_or(defaults.media_types_url),
            organization_api_url: var("REFDATA_ORGANIZATION_API_URL"),
            coordinator,
        })
    }
}

fn parse_number<T, F>(var: &F, key: &str) -> Result<Option<T>, SyncError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                SyncError::config(format!(
                    "{} must be a non-negative integer, got '{}'",
                    key, raw
                ))
            })
        })
        .transpose()
}

fn duration_secs<F>(var: &F, key: &str) -> Result<Option<Duration>, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_number::<u64, F>(var, key)?.map(Duration::from_secs))
}

fn duration_millis<F>(var: &F, key: &str) -> Result<Option<Duration>, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_number::<u64, F>(var, key)?.map(Duration::from_millis))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SyncError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncError::config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, SyncError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = load(&[]).unwrap();

        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.coordinator, CoordinatorConfig::default());
        assert_eq!(config.coordinate_mode, CoordinateMode::File);
        assert!(config.organization_api_url.is_none());
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = load(&[
            ("OPENSEARCH_URL", "http://search:9200"),
            ("REFDATA_COORDINATE_MODE", "live"),
            ("REFDATA_FORCE_RELOAD", "true"),
            ("REFDATA_STARTUP_GRACE_MS", "500"),
            ("REFDATA_READ_MAX_RETRIES", "3"),
            ("REFDATA_ORGANIZATION_API_URL", "https://registry.example.org/orgs"),
        ])
        .unwrap();

        assert_eq!(config.opensearch_url, "http://search:9200");
        assert_eq!(config.coordinate_mode, CoordinateMode::Live);
        assert!(config.coordinator.force_reload);
        assert_eq!(config.coordinator.startup_grace, Duration::from_millis(500));
        assert_eq!(config.coordinator.read_max_retries, 3);
        assert_eq!(
            config.organization_api_url.as_deref(),
            Some("https://registry.example.org/orgs")
        );
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("REDIS_URL", "  "), ("REFDATA_READ_MAX_RETRIES", "")]).unwrap();

        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.coordinator.read_max_retries, DEFAULT_READ_MAX_RETRIES);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("REFDATA_READ_MAX_RETRIES", "many")]),
            Err(SyncError::ConfigError(_))
        ));
        assert!(matches!(
            load(&[("REFDATA_FORCE_RELOAD", "maybe")]),
            Err(SyncError::ConfigError(_))
        ));
        assert!(matches!(
            load(&[("REFDATA_COORDINATE_MODE", "satellite")]),
            Err(SyncError::PipelineError(_))
        ));
    }
}
