use crate::feeds::ReconnectPolicy;
use crate::renderer::DEFAULT_CAPACITY;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// The page the feed belongs to. Its scheme, host and query decide the
    /// push endpoint; `?filter=` selects the stream subset.
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Maximum number of items kept; the oldest are evicted first.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Log file used by the terminal UI. Defaults to the user cache dir.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_page_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_title() -> String {
    "Live Feed".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            capacity: default_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".livefeed").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn page_url(&self) -> Result<Url> {
        let url = Url::parse(&self.stream.page_url)
            .with_context(|| format!("invalid page_url `{}`", self.stream.page_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("page_url must be http or https, got `{}`", other),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.capacity == 0 {
            bail!("feed capacity must be at least 1");
        }
        if self.stream.handshake_timeout_secs == 0 {
            bail!("handshake_timeout_secs must be at least 1");
        }
        self.page_url()?;
        self.reconnect
            .validate()
            .map_err(|msg| anyhow::anyhow!(msg))?;
        Ok(())
    }
}
