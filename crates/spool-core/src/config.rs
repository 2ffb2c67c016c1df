// ABOUTME: Configuration loading and validation for the spool cache and uploader.
// ABOUTME: Reads SPOOL_* environment variables and exposes builder setters for embedding and tests.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default cap on total cached bytes across both journals (100 MiB).
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 100 * 1024 * 1024;

/// Default window after a transport failure during which no deliveries are attempted.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Default capacity of the in-memory queue used when the journal cannot be opened.
pub const DEFAULT_FALLBACK_CAPACITY: usize = 100;

/// Default per-request timeout applied by the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_GATEWAY_URL: &str = "https://data.example.com/v0";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid {expected}: {value}")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("SPOOL_FALLBACK_CAPACITY must be greater than zero")]
    ZeroFallbackCapacity,
}

/// Cache and uploader configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub max_cache_bytes: u64,
    pub backoff: Duration,
    pub fallback_capacity: usize,
    pub request_timeout: Duration,
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub auto_upload: bool,
    pub mid_session_auto_upload: bool,
}

impl CacheConfig {
    /// Configuration with default limits rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            backoff: DEFAULT_BACKOFF,
            fallback_capacity: DEFAULT_FALLBACK_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_key: None,
            auto_upload: true,
            mid_session_auto_upload: true,
        }
    }

    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - SPOOL_CACHE_DIR: journal directory (default: ~/.spool/cache)
    /// - SPOOL_MAX_CACHE_BYTES: size cap across both journals (default: 100 MiB)
    /// - SPOOL_BACKOFF_SECS: backoff window after a failed delivery (default: 10)
    /// - SPOOL_FALLBACK_CAPACITY: in-memory queue capacity (default: 100)
    /// - SPOOL_REQUEST_TIMEOUT_SECS: HTTP request timeout (default: 5)
    /// - SPOOL_GATEWAY_URL: base URL for derived destinations
    /// - SPOOL_API_KEY: API key sent with each upload (optional)
    /// - SPOOL_AUTO_UPLOAD / SPOOL_MID_SESSION_UPLOAD: policy toggles (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let cache_dir = std::env::var("SPOOL_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".spool")
                    .join("cache")
            });

        let max_cache_bytes =
            parse_var("SPOOL_MAX_CACHE_BYTES", "byte count")?.unwrap_or(DEFAULT_MAX_CACHE_BYTES);

        let backoff = parse_var::<u64>("SPOOL_BACKOFF_SECS", "number of seconds")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_BACKOFF);

        let fallback_capacity = parse_var("SPOOL_FALLBACK_CAPACITY", "capacity")?
            .unwrap_or(DEFAULT_FALLBACK_CAPACITY);
        if fallback_capacity == 0 {
            return Err(ConfigError::ZeroFallbackCapacity);
        }

        let request_timeout = parse_var::<u64>("SPOOL_REQUEST_TIMEOUT_SECS", "number of seconds")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let gateway_url = std::env::var("SPOOL_GATEWAY_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        let api_key = std::env::var("SPOOL_API_KEY").ok().filter(|k| !k.is_empty());

        let auto_upload = parse_flag("SPOOL_AUTO_UPLOAD")?.unwrap_or(true);
        let mid_session_auto_upload = parse_flag("SPOOL_MID_SESSION_UPLOAD")?.unwrap_or(true);

        Ok(Self {
            cache_dir,
            max_cache_bytes,
            backoff,
            fallback_capacity,
            request_timeout,
            gateway_url,
            api_key,
            auto_upload,
            mid_session_auto_upload,
        })
    }

    pub fn with_max_cache_bytes(mut self, max_cache_bytes: u64) -> Self {
        self.max_cache_bytes = max_cache_bytes;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_fallback_capacity(mut self, capacity: usize) -> Self {
        self.fallback_capacity = capacity.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: impl Into<String>) -> Self {
        self.gateway_url = gateway_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_auto_upload(mut self, auto_upload: bool) -> Self {
        self.auto_upload = auto_upload;
        self
    }
}

fn parse_var<T: FromStr>(var: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var,
                expected,
                value,
            }),
        _ => Ok(None),
    }
}

fn parse_flag(var: &'static str) -> Result<Option<bool>, ConfigError> {
    let Ok(value) = std::env::var(var) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "boolean",
            value,
        }),
    }
}
