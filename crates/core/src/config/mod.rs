//! Application configuration with layered loading.
//!
//! Uses figment to merge, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if YOUTUBE_TRANSCRIBER_CONFIG_FILE set)
//! 3. Environment variables (YOUTUBE_TRANSCRIBER_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Prefix shared by every environment variable the server reads.
pub const ENV_PREFIX: &str = "YOUTUBE_TRANSCRIBER_";

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "YOUTUBE_TRANSCRIBER_CONFIG_FILE";

const CACHE_FILE_NAME: &str = "transcripts_cache.sqlite3";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite transcript cache.
    ///
    /// Set via YOUTUBE_TRANSCRIBER_CACHE_PATH.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// YouTube Data API key. Its presence selects the API fetch method.
    ///
    /// Set via YOUTUBE_TRANSCRIBER_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// yt-dlp executable name or path.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

/// Cache file next to the running executable, or in the working directory
/// when the executable path is unknown.
fn default_cache_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CACHE_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(".").join(CACHE_FILE_NAME))
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_ytdlp_path() -> String {
    "yt-dlp".into()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            api_key: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            ytdlp_path: default_ytdlp_path(),
            accept_language: default_accept_language(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file or environment cannot be
    /// parsed, or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a config from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The configured API key, if any non-blank one is set.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
