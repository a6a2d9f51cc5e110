//! Configuration management for the gateway
//!
//! Loads configuration from a TOML file at startup.
//! All values are configurable to avoid hardcoded constants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when none is given on the command line or in the environment
pub const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Gateway Configuration
///
/// Loaded from TOML at startup. Every field has a default so a partial
/// file only needs to override what differs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Worker pool, UDP listener and process settings
    #[serde(default)]
    pub core: CoreConfig,

    /// HTTP ingestion endpoint settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Broker settings
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Log sink settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Core pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Number of parallel produce workers
    #[serde(default = "default_worker_num")]
    pub worker_num: usize,

    /// Work queue capacity (messages)
    #[serde(default = "default_queue_num")]
    pub queue_num: usize,

    /// UDP bind host
    #[serde(default = "default_host")]
    pub udp_host: String,

    /// UDP listen port
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// UDP socket receive buffer (SO_RCVBUF) in bytes
    #[serde(default = "default_udp_read_buf_size")]
    pub udp_read_buf_size: usize,

    /// Per-read deadline of the UDP loop in milliseconds
    #[serde(default = "default_udp_read_timeout_ms")]
    pub udp_read_timeout_ms: u64,

    /// Maximum datagram size; longer datagrams are truncated
    #[serde(default = "default_log_size")]
    pub log_size: usize,

    /// Forced-exit deadline after a termination signal, in seconds (0 = default)
    #[serde(default = "default_failfast_timeout_secs")]
    pub failfast_timeout_secs: u64,

    /// Keep-alive tick interval in milliseconds
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,

    /// Log worker pool status every N keep-alive ticks
    #[serde(default = "default_report_every_ticks")]
    pub report_every_ticks: u64,

    /// PID file settings
    #[serde(default)]
    pub pid: PidConfig,
}

/// PID file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PidConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_pid_path")]
    pub path: PathBuf,

    /// Overwrite an existing PID file instead of refusing to start
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}

/// HTTP endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Route accepting log batches
    #[serde(default = "default_http_path")]
    pub path: String,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Maximum size of a decompressed `logText` payload
    #[serde(default = "default_max_decoded_bytes")]
    pub max_decoded_bytes: usize,
}

/// Broker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Bootstrap brokers (host:port)
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,

    /// Topics accepted as `bizType` on the HTTP endpoint
    #[serde(default)]
    pub http_topics: Vec<String>,

    /// Topic for every UDP datagram
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Record batch compression
    #[serde(default)]
    pub compression: BrokerCompression,
}

/// Compression applied to produced record batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerCompression {
    #[default]
    None,
    Gzip,
}

/// Log sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Directory holding the rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Default filter directive (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            worker_num: default_worker_num(),
            queue_num: default_queue_num(),
            udp_host: default_host(),
            udp_port: default_udp_port(),
            udp_read_buf_size: default_udp_read_buf_size(),
            udp_read_timeout_ms: default_udp_read_timeout_ms(),
            log_size: default_log_size(),
            failfast_timeout_secs: default_failfast_timeout_secs(),
            keepalive_ms: default_keepalive_ms(),
            report_every_ticks: default_report_every_ticks(),
            pid: PidConfig::default(),
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_pid_path(),
            override_existing: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            path: default_http_path(),
            max_body_bytes: default_max_body_bytes(),
            max_decoded_bytes: default_max_decoded_bytes(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            http_topics: Vec::new(),
            default_topic: default_topic(),
            compression: BrokerCompression::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_worker_num() -> usize {
    8
}

fn default_queue_num() -> usize {
    10_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_udp_port() -> u16 {
    4000
}

fn default_udp_read_buf_size() -> usize {
    4 * 1024 * 1024
}

fn default_udp_read_timeout_ms() -> u64 {
    1000
}

fn default_log_size() -> usize {
    64 * 1024
}

fn default_failfast_timeout_secs() -> u64 {
    3
}

fn default_keepalive_ms() -> u64 {
    1000
}

fn default_report_every_ticks() -> u64 {
    60
}

fn default_pid_path() -> PathBuf {
    PathBuf::from("run/log-gateway.pid")
}

fn default_http_port() -> u16 {
    3000
}

fn default_http_path() -> String {
    "/log".to_string()
}

fn default_max_body_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_max_decoded_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_brokers() -> Vec<String> {
    vec!["127.0.0.1:9092".to_string()]
}

fn default_topic() -> String {
    "udp-log".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// With no explicit path, `gateway.toml` is tried and built-in defaults
    /// are used if it doesn't exist.
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Config::default(),
            Err(e) => return Err(ConfigError::IoError(e)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and normalize configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if config.core.failfast_timeout_secs == 0 {
            config.core.failfast_timeout_secs = default_failfast_timeout_secs();
        }
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.core.worker_num == 0 {
            return invalid("core.worker_num must be greater than zero");
        }
        if self.core.queue_num == 0 {
            return invalid("core.queue_num must be greater than zero");
        }
        if self.core.log_size == 0 {
            return invalid("core.log_size must be greater than zero");
        }
        if self.core.udp_read_timeout_ms == 0 {
            return invalid("core.udp_read_timeout_ms must be greater than zero");
        }
        if self.core.keepalive_ms == 0 {
            return invalid("core.keepalive_ms must be greater than zero");
        }
        if self.kafka.default_topic.is_empty() {
            return invalid("kafka.default_topic must not be empty");
        }
        if self.kafka.brokers.is_empty() {
            return invalid("kafka.brokers must list at least one broker");
        }
        if !self.http.path.starts_with('/') {
            return invalid("http.path must start with '/'");
        }
        if self.http.max_decoded_bytes == 0 {
            return invalid("http.max_decoded_bytes must be greater than zero");
        }
        Ok(())
    }

    #[inline]
    pub fn failfast_timeout(&self) -> Duration {
        Duration::from_secs(self.core.failfast_timeout_secs)
    }

    #[inline]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.core.keepalive_ms)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
    /// Parsed but unusable value
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) | ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.core.worker_num, 8);
        assert_eq!(config.core.queue_num, 10_000);
        assert_eq!(config.core.failfast_timeout_secs, 3);
        assert_eq!(config.http.path, "/log");
        assert_eq!(config.http.max_decoded_bytes, 64 * 1024 * 1024);
        assert_eq!(config.kafka.default_topic, "udp-log");
        assert_eq!(config.kafka.compression, BrokerCompression::None);
        assert!(config.kafka.http_topics.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [core]
            worker_num = 2
            udp_port = 9999

            [core.pid]
            enabled = true
            override = true

            [kafka]
            http_topics = ["app1", "app2"]
            compression = "gzip"
            "#,
        )
        .unwrap();

        assert_eq!(config.core.worker_num, 2);
        assert_eq!(config.core.udp_port, 9999);
        assert_eq!(config.core.queue_num, 10_000);
        assert!(config.core.pid.enabled);
        assert!(config.core.pid.override_existing);
        assert_eq!(config.kafka.http_topics, vec!["app1", "app2"]);
        assert_eq!(config.kafka.compression, BrokerCompression::Gzip);
        assert_eq!(config.http.port, 3000);
    }

    #[test]
    fn test_zero_failfast_uses_default() {
        let config = Config::from_toml_str("[core]\nfailfast_timeout_secs = 0\n").unwrap();
        assert_eq!(config.failfast_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let config = Config::from_toml_str("[core]\nworker_num = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_empty_default_topic() {
        let config = Config::from_toml_str("[kafka]\ndefault_topic = \"\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_zero_decoded_limit() {
        let config = Config::from_toml_str("[http]\nmax_decoded_bytes = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[core\nworker_num = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/gateway.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
