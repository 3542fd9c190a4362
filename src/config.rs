//! Server configuration read from the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings for the server binary.
#[derive(Clone)]
pub struct Config {
    /// Credential for the upstream image service.
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub bind_addr: SocketAddr,
    /// Optional directory of front-end assets served for unmatched paths.
    pub static_dir: Option<PathBuf>,
    pub upstream_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl Config {
    /// Reads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let openai_base_url = get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let bind_value = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_value
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBindAddr {
                value: bind_value.clone(),
                reason: e.to_string(),
            })?;

        let upstream_timeout = match get("UPSTREAM_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        Ok(Self {
            openai_api_key,
            openai_base_url,
            bind_addr,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            upstream_timeout,
        })
    }
}
