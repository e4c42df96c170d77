//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! Telegram API endpoints and timeouts, worker queue sizing, transfer pacing,
//! logging format, and default paths. `AppConfig` is the root configuration
//! struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// Telegram API Constants
// =============================================================================

/// Base URL of the Telegram Bot API (overridable via `telegram.api_base`)
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// User-Agent header sent with every API request
pub const USER_AGENT: &str = formatcp!("courier/{}", env!("CARGO_PKG_VERSION"));

/// Long-poll duration for getUpdates, in seconds
pub const LONG_POLL_TIMEOUT_SECS: u64 = 50;

/// HTTP timeout for ordinary API calls, in seconds
pub const API_CALL_TIMEOUT_SECS: u64 = 30;

/// HTTP timeout for media downloads and uploads, in seconds
pub const MEDIA_TRANSFER_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Worker Queue Constants
// =============================================================================

/// Capacity of the high-priority request queue (operator-facing sends/edits)
pub const TELEGRAM_HIGH_PRIORITY_QUEUE_CAPACITY: usize = 50;

/// Capacity of the normal-priority request queue (mirror transfers)
pub const TELEGRAM_NORMAL_PRIORITY_QUEUE_CAPACITY: usize = 50;

/// Capacity of the low-priority request queue (background lookups)
pub const TELEGRAM_LOW_PRIORITY_QUEUE_CAPACITY: usize = 100;

/// Aging threshold in seconds: process low-priority requests after this
/// duration of starvation to prevent indefinite delays under sustained load
pub const TELEGRAM_PRIORITY_AGING_SECS: u64 = 10;

// =============================================================================
// Retry and Backoff Constants
// =============================================================================

/// Flood waits no longer than this are retried inside the worker; longer
/// waits are surfaced to the caller so jobs can announce the pause
pub const FLOOD_WAIT_WORKER_MAX_SECS: u64 = 5;

/// Maximum transparent flood-wait retries per request inside a worker
pub const FLOOD_WAIT_MAX_RETRIES: u32 = 3;

/// Delay in seconds before retrying getUpdates after a transport failure
pub const DISPATCH_RETRY_DELAY_SECS: u64 = 5;

/// Grace period in seconds for background tasks after shutdown is signalled
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

// =============================================================================
// Chat Metadata Cache Constants
// =============================================================================

/// Maximum number of cached getChat results
pub const CHAT_CACHE_MAX_CAPACITY: u64 = 1000;

/// TTL in seconds for cached getChat results
pub const CHAT_CACHE_TTL_SECS: u64 = 3600;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default path of the persistent monitoring registry
pub const DEFAULT_DB_PATH: &str = "monitoring_channels.json";

/// Default directory for temporary media downloads
pub const DEFAULT_TEMP_DIR: &str = "temp_media";

/// Environment variable that overrides `telegram.bot_token`
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "courier=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Log format value selecting structured JSON output
pub const LOG_FORMAT_JSON: &str = "json";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP health endpoint configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Telegram credentials and API settings
    pub telegram: TelegramConfig,
    /// Transfer pacing settings
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Registry and temp-file paths
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP health endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }
}

/// Telegram credentials and API settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token (may also come from the BOT_TOKEN environment variable)
    #[serde(default)]
    pub bot_token: String,
    /// User id of the operator allowed to drive the bot
    pub owner_id: i64,
    /// Chat id of the channel that mirrored media is posted to
    pub target_channel: i64,
    /// Bot API base URL (override for testing against a local server)
    #[serde(default = "TelegramConfig::default_api_base")]
    pub api_base: String,
    /// End-to-end timeout for a pooled request in seconds
    #[serde(default = "TelegramConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Number of API workers (default: 2)
    pub worker_count: Option<usize>,
}

impl TelegramConfig {
    fn default_api_base() -> String {
        TELEGRAM_API_BASE.to_string()
    }

    fn default_request_timeout() -> u64 {
        300
    }

    /// Get worker count (default: 2)
    pub fn worker_count(&self) -> usize {
        self.worker_count.unwrap_or(2)
    }
}

/// Transfer pacing settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Delay between copy operations during a range mirror, in seconds
    #[serde(default = "TransferConfig::default_message_delay")]
    pub message_delay_seconds: u64,
    /// Delay after mirroring a new monitored post, in seconds
    #[serde(default = "TransferConfig::default_monitor_delay")]
    pub monitor_delay_seconds: u64,
    /// Edit the status message every this many processed messages
    #[serde(default = "TransferConfig::default_status_interval")]
    pub status_interval: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            message_delay_seconds: Self::default_message_delay(),
            monitor_delay_seconds: Self::default_monitor_delay(),
            status_interval: Self::default_status_interval(),
        }
    }
}

impl TransferConfig {
    fn default_message_delay() -> u64 {
        5
    }

    fn default_monitor_delay() -> u64 {
        2
    }

    fn default_status_interval() -> u32 {
        10
    }
}

/// Registry and temp-file paths
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the persistent monitoring registry (JSON)
    #[serde(default = "StorageConfig::default_db_path")]
    pub db_path: String,
    /// Directory for temporary media downloads
    #[serde(default = "StorageConfig::default_temp_dir")]
    pub temp_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
            temp_dir: Self::default_temp_dir(),
        }
    }
}

impl StorageConfig {
    fn default_db_path() -> String {
        DEFAULT_DB_PATH.to_string()
    }

    fn default_temp_dir() -> String {
        DEFAULT_TEMP_DIR.to_string()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_override(std::env::var(BOT_TOKEN_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (no env override, no validation)
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply the BOT_TOKEN environment override, which takes precedence over
    /// the file so a token never has to be written to disk
    fn apply_env_override(&mut self, token: Option<String>) {
        if let Some(token) = token {
            if !token.trim().is_empty() {
                self.telegram.bot_token = token.trim().to_string();
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "No bot token configured. Set telegram.bot_token or the BOT_TOKEN environment variable".to_string(),
            ));
        }
        if self.telegram.owner_id == 0 {
            return Err(ConfigError::Validation(
                "telegram.owner_id must be set to the operator's user id".to_string(),
            ));
        }
        if self.telegram.target_channel == 0 {
            return Err(ConfigError::Validation(
                "telegram.target_channel must be set to the destination channel id".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [telegram]
        bot_token = "123:abc"
        owner_id = 42
        target_channel = -1001234567890
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.telegram.api_base, TELEGRAM_API_BASE);
        assert_eq!(config.telegram.worker_count(), 2);
        assert_eq!(config.transfer.message_delay_seconds, 5);
        assert_eq!(config.transfer.monitor_delay_seconds, 2);
        assert_eq!(config.transfer.status_interval, 10);
        assert_eq!(config.storage.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.storage.temp_dir, DEFAULT_TEMP_DIR);
        assert_eq!(config.logging.format, DEFAULT_LOG_FORMAT);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [http]
            port = 9000

            [telegram]
            bot_token = "123:abc"
            owner_id = 42
            target_channel = -100
            worker_count = 4

            [transfer]
            message_delay_seconds = 1
        "#,
        )
        .unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.telegram.worker_count(), 4);
        assert_eq!(config.transfer.message_delay_seconds, 1);
        // Untouched sections keep their defaults
        assert_eq!(config.transfer.status_interval, 10);
    }

    #[test]
    fn test_missing_telegram_section_is_a_parse_error() {
        let result = AppConfig::from_toml_str("[http]\nport = 8000\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_override_replaces_file_token() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.apply_env_override(Some("456:def".to_string()));
        assert_eq!(config.telegram.bot_token, "456:def");
    }

    #[test]
    fn test_blank_env_override_is_ignored() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.apply_env_override(Some("   ".to_string()));
        assert_eq!(config.telegram.bot_token, "123:abc");
    }

    #[test]
    fn test_validation_rejects_empty_token() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.telegram.bot_token = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_owner() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.telegram.owner_id = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.telegram.owner_id, 42);
        assert!(!config.telegram.bot_token.is_empty());
    }
}
