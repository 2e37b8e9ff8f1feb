use std::time::Duration;

use crate::error::{AppError, Result};

pub const DATA_URL: &str =
    "https://raw.githubusercontent.com/doomercreatine/MasterCasketBot/main/updated_db.json";
pub const META_URL: &str =
    "https://api.github.com/repos/doomercreatine/MasterCasketBot/contents/updated_db.json";

/// Field of the metadata response holding the content identifier.
pub const META_HASH_FIELD: &str = "sha";

/// TinyDB stores documents under this table key unless told otherwise.
pub const TABLE_KEY: &str = "_default";

/// Check that a downloaded body hashes to the advertised git blob sha. The raw
/// file CDN can serve the previous body for minutes after the contents API
/// already reports the new sha.
pub const VERIFY_BLOB_SHA: bool = true;

/// Snapshot poll interval (seconds).
pub const POLL_INTERVAL_SECS: u64 = 300;

/// Per-request timeout for the dataset and metadata endpoints (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Retry delays for transient fetch failures, in milliseconds. One retry per entry.
pub const FETCH_RETRY_BACKOFF_MS: &[u64] = &[500, 1000, 2000];

/// Rows shown on the leaderboard unless the caller asks for more.
pub const LEADERBOARD_SIZE: usize = 10;

/// Width of the guess drill-down histogram bins, anchored at zero.
pub const GUESS_BIN_WIDTH: f64 = 100_000.0;

/// Points on the shared KDE evaluation grid.
pub const KDE_GRID_POINTS: usize = 200;

/// Percentile bounds for guess winsorization.
pub mod winsor {
    pub const LOWER_PCT: f64 = 2.5;
    pub const UPPER_PCT: f64 = 97.5;
}

/// User agent sent to the remote endpoints; the GitHub API rejects anonymous clients.
pub const USER_AGENT: &str = concat!("casket-tracker/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Config {
    pub data_url: String,
    /// None disables the metadata endpoint; the body digest is used instead (META_URL="").
    pub meta_url: Option<String>,
    pub meta_hash_field: String,
    pub verify_blob_sha: bool,
    pub table_key: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub retry_backoff: Vec<Duration>,
    pub leaderboard_size: usize,
    pub guess_bin_width: f64,
    pub kde_grid_points: usize,
    pub log_level: String,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_url: DATA_URL.to_string(),
            meta_url: Some(META_URL.to_string()),
            meta_hash_field: META_HASH_FIELD.to_string(),
            verify_blob_sha: VERIFY_BLOB_SHA,
            table_key: TABLE_KEY.to_string(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            retry_backoff: FETCH_RETRY_BACKOFF_MS
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            leaderboard_size: LEADERBOARD_SIZE,
            guess_bin_width: GUESS_BIN_WIDTH,
            kde_grid_points: KDE_GRID_POINTS,
            log_level: "info".to_string(),
            api_port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys fall back to the defaults;
    /// set-but-malformed numeric keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let meta_url = match lookup("META_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url.trim().to_string()),
            None => defaults.meta_url,
        };

        let retry_backoff = match lookup("FETCH_RETRY_BACKOFF_MS") {
            Some(raw) => parse_backoff_list(&raw)?,
            None => defaults.retry_backoff,
        };

        let guess_bin_width: f64 = parse_or("GUESS_BIN_WIDTH", &lookup, defaults.guess_bin_width)?;
        if !(guess_bin_width > 0.0 && guess_bin_width.is_finite()) {
            return Err(AppError::Config(
                "GUESS_BIN_WIDTH must be a positive number".to_string(),
            ));
        }

        let poll_secs: u64 = parse_or("POLL_INTERVAL_SECS", &lookup, POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(AppError::Config(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            data_url: lookup("DATA_URL").unwrap_or(defaults.data_url),
            meta_url,
            meta_hash_field: lookup("META_HASH_FIELD").unwrap_or(defaults.meta_hash_field),
            verify_blob_sha: parse_or("VERIFY_BLOB_SHA", &lookup, defaults.verify_blob_sha)?,
            table_key: lookup("TABLE_KEY").unwrap_or(defaults.table_key),
            poll_interval: Duration::from_secs(poll_secs),
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECS",
                &lookup,
                FETCH_TIMEOUT_SECS,
            )?),
            retry_backoff,
            leaderboard_size: parse_or("LEADERBOARD_SIZE", &lookup, defaults.leaderboard_size)?,
            guess_bin_width,
            kde_grid_points: parse_or("KDE_GRID_POINTS", &lookup, defaults.kde_grid_points)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            api_port: parse_or("API_PORT", &lookup, defaults.api_port)?,
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_backoff_list(raw: &str) -> Result<Vec<Duration>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                AppError::Config(format!(
                    "FETCH_RETRY_BACKOFF_MS must be a comma-separated list of milliseconds, got {raw:?}"
                ))
            })
        })
        .collect()
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
    fn defaults_when_nothing_set() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert_eq!(cfg.meta_url.as_deref(), Some(META_URL));
        assert_eq!(cfg.table_key, "_default");
        assert_eq!(cfg.retry_backoff.len(), FETCH_RETRY_BACKOFF_MS.len());
        assert_eq!(cfg.leaderboard_size, 10);
        assert!(cfg.verify_blob_sha);
    }

    #[test]
    fn blob_sha_check_can_be_disabled() {
        let cfg = Config::from_lookup(lookup_from(&[("VERIFY_BLOB_SHA", "false")])).unwrap();
        assert!(!cfg.verify_blob_sha);
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("VERIFY_BLOB_SHA", "maybe")])),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn empty_meta_url_disables_metadata() {
        let cfg = Config::from_lookup(lookup_from(&[("META_URL", "")])).unwrap();
        assert!(cfg.meta_url.is_none());
    }

    #[test]
    fn backoff_list_is_parsed_in_order() {
        let cfg =
            Config::from_lookup(lookup_from(&[("FETCH_RETRY_BACKOFF_MS", "10, 20,30")])).unwrap();
        assert_eq!(
            cfg.retry_backoff,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(30)
            ]
        );

        let none = Config::from_lookup(lookup_from(&[("FETCH_RETRY_BACKOFF_MS", "")])).unwrap();
        assert!(none.retry_backoff.is_empty());
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("API_PORT", "eighty")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("POLL_INTERVAL_SECS", "0")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("GUESS_BIN_WIDTH", "-5")])),
            Err(AppError::Config(_))
        ));
    }
}
