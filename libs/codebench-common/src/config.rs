// Runtime settings shared by the API, worker and CLI

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_JUDGE0_URL: &str = "https://judge0-ce.p.rapidapi.com";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLLS: u32 = 30;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub judge0_url: String,
    /// Empty means the remote path is disabled
    pub judge0_api_key: Option<String>,
    pub judge0_host: Option<String>,
    pub judge0_poll_interval_ms: u64,
    pub judge0_max_polls: u32,
    /// Benchmark log directory; `None` keeps benchmarks in memory only
    pub data_dir: Option<PathBuf>,
    pub max_concurrency: usize,
    pub languages_config: Option<PathBuf>,
    /// Per-language baseline overrides (JSON)
    pub baselines_config: Option<PathBuf>,
    pub api_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            judge0_url: DEFAULT_JUDGE0_URL.to_string(),
            judge0_api_key: None,
            judge0_host: None,
            judge0_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            judge0_max_polls: DEFAULT_MAX_POLLS,
            data_dir: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            languages_config: None,
            baselines_config: None,
            api_addr: DEFAULT_API_ADDR.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_concurrency = parse_or(&lookup, "CODEBENCH_MAX_CONCURRENCY", defaults.max_concurrency);
        let max_concurrency = if max_concurrency == 0 {
            warn!("CODEBENCH_MAX_CONCURRENCY must be positive, using {}", DEFAULT_MAX_CONCURRENCY);
            DEFAULT_MAX_CONCURRENCY
        } else {
            max_concurrency
        };

        Self {
            redis_url: text("REDIS_URL").unwrap_or(defaults.redis_url),
            judge0_url: text("JUDGE0_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.judge0_url),
            judge0_api_key: text("JUDGE0_API_KEY"),
            judge0_host: text("JUDGE0_HOST"),
            judge0_poll_interval_ms: parse_or(&lookup, "JUDGE0_POLL_INTERVAL_MS", defaults.judge0_poll_interval_ms),
            judge0_max_polls: parse_or(&lookup, "JUDGE0_MAX_POLLS", defaults.judge0_max_polls),
            data_dir: text("CODEBENCH_DATA_DIR").map(PathBuf::from),
            max_concurrency,
            languages_config: text("LANGUAGES_CONFIG").map(PathBuf::from),
            baselines_config: text("BASELINES_CONFIG").map(PathBuf::from),
            api_addr: text("CODEBENCH_API_ADDR").unwrap_or(defaults.api_addr),
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.judge0_api_key.is_some()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) if raw.trim().is_empty() => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key = key, value = %raw, "Invalid numeric setting, using default {}", default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(s.judge0_url, DEFAULT_JUDGE0_URL);
        assert_eq!(s.judge0_poll_interval_ms, 1000);
        assert_eq!(s.judge0_max_polls, 30);
        assert_eq!(s.max_concurrency, 4);
        assert!(s.data_dir.is_none());
        assert!(!s.remote_enabled());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let s = settings(&[
            ("JUDGE0_MAX_POLLS", "lots"),
            ("CODEBENCH_MAX_CONCURRENCY", "0"),
            ("JUDGE0_POLL_INTERVAL_MS", "250"),
        ]);
        assert_eq!(s.judge0_max_polls, DEFAULT_MAX_POLLS);
        assert_eq!(s.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(s.judge0_poll_interval_ms, 250);
    }

    #[test]
    fn test_empty_api_key_disables_remote() {
        let s = settings(&[("JUDGE0_API_KEY", "  ")]);
        assert!(!s.remote_enabled());
        let s = settings(&[("JUDGE0_API_KEY", "secret"), ("JUDGE0_URL", "http://localhost:2358/")]);
        assert!(s.remote_enabled());
        assert_eq!(s.judge0_url, "http://localhost:2358");
    }
}
