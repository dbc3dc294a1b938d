use std::time::Duration;

/// Default base URL of the remote API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API, without a trailing slash.
    pub api_url: String,
    /// Transport deadline applied to every gateway call (default: `120`).
    pub request_timeout_secs: u64,
    /// Default history page size (default: `12`).
    pub history_page_size: u32,
    /// Freshness window of history pages (default: `30`).
    pub history_stale_secs: u64,
    /// Freshness window of the model catalog (default: `300`).
    pub models_stale_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 120,
            history_page_size: 12,
            history_stale_secs: 30,
            models_stale_secs: 300,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                      |
    /// |----------------------------------|------------------------------|
    /// | `SPRITEGEN_API_URL`              | `http://localhost:8000/api`  |
    /// | `SPRITEGEN_REQUEST_TIMEOUT_SECS` | `120`                        |
    /// | `SPRITEGEN_HISTORY_PAGE_SIZE`    | `12`                         |
    /// | `SPRITEGEN_HISTORY_STALE_SECS`   | `30`                         |
    /// | `SPRITEGEN_MODELS_STALE_SECS`    | `300`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("SPRITEGEN_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let request_timeout_secs = parse_var(
            &lookup,
            "SPRITEGEN_REQUEST_TIMEOUT_SECS",
            "a positive integer",
            defaults.request_timeout_secs,
        )?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SPRITEGEN_REQUEST_TIMEOUT_SECS",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let history_page_size = parse_var(
            &lookup,
            "SPRITEGEN_HISTORY_PAGE_SIZE",
            "a positive integer",
            defaults.history_page_size,
        )?
        .max(1);

        let history_stale_secs = parse_var(
            &lookup,
            "SPRITEGEN_HISTORY_STALE_SECS",
            "a number of seconds",
            defaults.history_stale_secs,
        )?;

        let models_stale_secs = parse_var(
            &lookup,
            "SPRITEGEN_MODELS_STALE_SECS",
            "a number of seconds",
            defaults.models_stale_secs,
        )?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout_secs,
            history_page_size,
            history_stale_secs,
            models_stale_secs,
        })
    }

    /// Override the base URL, e.g. from a command-line flag.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn history_stale_time(&self) -> Duration {
        Duration::from_secs(self.history_stale_secs)
    }

    pub fn models_stale_time(&self) -> Duration {
        Duration::from_secs(self.models_stale_secs)
    }
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}
