//! Configuration file parser for ~/.config/feedsync/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Well-formed TOML with a value the engine cannot run with.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between the end of one poll pass and the start of the next.
    pub poll_interval_secs: u64,

    /// Upper bound on a single feed fetch.
    pub fetch_timeout_secs: u64,

    /// Largest response body accepted from a feed.
    pub max_feed_size_bytes: usize,

    /// How many feeds are fetched at once during a pass. 0 is treated as 1.
    pub max_concurrent_fetches: usize,

    /// Read-through proxy base, e.g. `https://allorigins.hexlet.app/raw?disableCache=true`.
    /// The feed address is appended as a `url` query parameter.
    pub proxy_url: Option<String>,

    /// Accept feeds on localhost and private networks.
    pub allow_private_hosts: bool,

    /// Feed URLs registered at startup, in order.
    pub feeds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            fetch_timeout_secs: 10,
            max_feed_size_bytes: 10 * 1024 * 1024,
            max_concurrent_fetches: 10,
            proxy_url: None,
            allow_private_hosts: false,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "poll_interval_secs",
        "fetch_timeout_secs",
        "max_feed_size_bytes",
        "max_concurrent_fetches",
        "proxy_url",
        "allow_private_hosts",
        "feeds",
    ];

    /// `~/.config/feedsync/config.toml`, or `None` when `HOME` is unset.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("feedsync")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML or wrong types → `Err(ConfigError::Parse)`
    /// - Zero interval or timeout, unparsable proxy → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than 0".into(),
            ));
        }
        self.proxy()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    /// The proxy base as a URL, if one is configured.
    pub fn proxy(&self) -> Result<Option<Url>, ConfigError> {
        self.proxy_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| ConfigError::Invalid(format!("proxy_url {raw:?}: {e}")))
            })
            .transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================
