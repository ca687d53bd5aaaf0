//! Configuration file parser for ~/.config/announcer/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as a warning, since they are most
//! likely typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FeederSettings, FetchOptions, ParseOptions, DEFAULT_FEED_URL, MAX_ITEMS};
use crate::feed::fetcher::{MAX_FEED_SIZE, REQUEST_TIMEOUT};
use crate::feed::parser::DEFAULT_PLACEHOLDER_LINK;
use crate::util::{validate_url, UrlValidationError, PREVIEW_CHARS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed_url in config file: {0}")]
    InvalidFeedUrl(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed endpoint to refresh from.
    pub feed_url: String,

    /// Blog home page. `alternate` links pointing here are not article
    /// links. An empty string disables the check.
    pub placeholder_link: String,

    /// Number of articles kept after each refresh.
    pub max_items: usize,

    /// Length of the plain-text preview, in characters.
    pub preview_chars: usize,

    /// Bound on the whole feed download.
    pub request_timeout_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            placeholder_link: DEFAULT_PLACEHOLDER_LINK.to_string(),
            max_items: MAX_ITEMS,
            preview_chars: PREVIEW_CHARS,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            max_feed_bytes: MAX_FEED_SIZE,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "feed_url",
        "placeholder_link",
        "max_items",
        "preview_chars",
        "request_timeout_secs",
        "max_feed_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - `feed_url` that is not http(s) → `Err(ConfigError::InvalidFeedUrl)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory
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
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        validate_url(&config.feed_url)?;
        tracing::info!(
            feed_url = %config.feed_url,
            max_items = config.max_items,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Settings for the refresh pipeline.
    pub fn feeder_settings(&self) -> FeederSettings {
        let placeholder_link = Some(self.placeholder_link.trim())
            .filter(|link| !link.is_empty())
            .map(str::to_string);

        FeederSettings {
            feed_url: self.feed_url.clone(),
            fetch: FetchOptions {
                timeout: Duration::from_secs(self.request_timeout_secs),
                max_bytes: self.max_feed_bytes,
            },
            parse: ParseOptions {
                placeholder_link,
                preview_chars: self.preview_chars,
            },
            max_items: self.max_items,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
