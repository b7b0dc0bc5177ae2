//! Service configuration.
//!
//! Configuration lives in one TOML file. Every section and every field has a
//! default, so a partial file (or no file at all) still yields a complete
//! [`Config`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    /// Upstream metadata API
    pub upstream: UpstreamConfig,
    /// Episode and embed page fetches
    pub scraper: ScraperConfig,
    pub headless: HeadlessConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Base for every relative path below
    pub root_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, relative to `data.root_dir` unless absolute
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory, relative to `data.root_dir` unless absolute
    pub log_dir: String,
    /// trace, debug, info, warn or error
    pub default_level: String,
    pub console: bool,
    pub file: bool,
    /// JSON lines in the log files instead of plain text
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Answer CORS preflights for any origin
    pub cors_allow_any: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub timeout_secs: u64,
    /// Sites serve different markup to non-browser agents
    pub user_agent: String,
}

/// Headless browser fallback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// When false, no browser is ever launched and headless routes answer 503
    pub enabled: bool,

    /// Chrome/Chromium binary; searched on PATH when unset
    pub executable: Option<String>,

    pub user_agent: String,

    /// Deadline for loading a player page
    pub stream_timeout_secs: u64,

    /// Deadline for loading a gateway page
    pub gateway_timeout_secs: u64,

    /// Extra wait after the network goes idle, for timers and lazy players
    pub settle_delay_ms: u64,

    /// How long without requests counts as idle
    pub idle_quiet_ms: u64,

    /// Browser contexts allowed open at once
    pub max_contexts: usize,

    /// Download host that gateway pages lead to
    pub target_host: String,

    pub stream_referer: String,
    pub gateway_referer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Per client IP
    pub requests_per_minute: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: "data".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "history.db".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_allow_any: true,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://otakudesu-api.example.com/api".to_string(),
            timeout_secs: 30,
            user_agent: concat!("anime-stream-api/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: None,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            stream_timeout_secs: 20,
            gateway_timeout_secs: 15,
            settle_delay_ms: 2000,
            idle_quiet_ms: 500,
            max_contexts: 4,
            target_host: "pixeldrain.com".to_string(),
            stream_referer: "https://otakudesu.cloud/".to_string(),
            gateway_referer: "https://safelink.example.com/".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
        }
    }
}

impl HeadlessConfig {
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_quiet(&self) -> Duration {
        Duration::from_millis(self.idle_quiet_ms)
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.under_data_dir(&self.database.path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.under_data_dir(&self.logging.log_dir)
    }

    /// `host:port` for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn under_data_dir(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
