//! Configuration loading and typed config structures for the leaderboard service.
//!
//! The canonical configuration lives in `leaderboard.yaml` (path overridable
//! with `LEADERBOARD_CONFIG`). Every field has a default, so an empty file is
//! a valid configuration for a local NATS server and a snapshot directory
//! under `./data`.

use std::path::Path;
use std::time::Duration;

use leaderboard_types::UpdateMode;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeaderboardConfig {
    /// Event stream connection.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snapshot cadence.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Query API.
    #[serde(default)]
    pub query: QueryConfig,

    /// Score validation and update semantics.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Consumer retry behavior.
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// Activity sketch dimensions.
    #[serde(default)]
    pub sketch: SketchConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LeaderboardConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// - `NATS_URL`, `NATS_USER`, `NATS_PASSWORD`, `NATS_TOKEN`,
    ///   `NATS_CREDENTIALS_FILE` override `stream.*`
    /// - `SNAPSHOT_LOCATION` overrides `storage.location`
    /// - `QUERY_PORT` overrides `query.port`
    /// - `LOG_LEVEL` overrides `logging.level`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// An unparsable `QUERY_PORT` is ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("NATS_URL") {
            self.stream.url = val;
        }
        if let Some(val) = lookup("NATS_USER") {
            self.stream.user = Some(val);
        }
        if let Some(val) = lookup("NATS_PASSWORD") {
            self.stream.password = Some(val);
        }
        if let Some(val) = lookup("NATS_TOKEN") {
            self.stream.token = Some(val);
        }
        if let Some(val) = lookup("NATS_CREDENTIALS_FILE") {
            self.stream.credentials_file = Some(val);
        }
        if let Some(val) = lookup("SNAPSHOT_LOCATION") {
            self.storage.location = val;
        }
        if let Some(val) = lookup("QUERY_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.query.port = port,
                Err(error) => tracing::warn!(value = %val, %error, "ignoring invalid QUERY_PORT"),
            }
        }
        if let Some(val) = lookup("LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));

        if self.scoring.min_score > self.scoring.max_score {
            return invalid("scoring.min_score must not exceed scoring.max_score");
        }
        if self.sketch.width == 0 || self.sketch.depth == 0 {
            return invalid("sketch.width and sketch.depth must be positive");
        }
        if self.query.max_top_k == 0 {
            return invalid("query.max_top_k must be positive");
        }
        if self.snapshot.dirty_threshold == 0 {
            return invalid("snapshot.dirty_threshold must be positive");
        }
        if self.snapshot.interval_ms == 0
            || self.query.timeout_ms == 0
            || self.consumer.lock_timeout_ms == 0
        {
            return invalid("timeouts and intervals must be positive");
        }
        if self.consumer.initial_backoff_ms > self.consumer.max_backoff_ms {
            return invalid("consumer.initial_backoff_ms must not exceed consumer.max_backoff_ms");
        }
        if self.stream.stream_name.is_empty() || self.stream.subject.is_empty() {
            return invalid("stream.stream_name and stream.subject must be set");
        }
        if self.storage.location.is_empty() {
            return invalid("storage.location must be set");
        }
        Ok(())
    }
}

/// Event stream connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub url: String,

    /// `JetStream` stream holding score updates.
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    /// Subject producers publish score updates on.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Subject dead letters are republished on. Unset keeps them in memory only.
    #[serde(default)]
    pub dead_letter_subject: Option<String>,

    /// Username for user/password authentication.
    #[serde(default)]
    pub user: Option<String>,

    /// Password for user/password authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Token authentication.
    #[serde(default)]
    pub token: Option<String>,

    /// Path to a `.creds` file.
    #[serde(default)]
    pub credentials_file: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            stream_name: default_stream_name(),
            subject: default_subject(),
            dead_letter_subject: None,
            user: None,
            password: None,
            token: None,
            credentials_file: None,
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// `file://` URL, bare directory path, or `postgres://` URL.
    #[serde(default = "default_storage_location")]
    pub location: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: default_storage_location(),
        }
    }
}

/// Snapshot cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotConfig {
    /// Maximum time between snapshots while the store is dirty.
    #[serde(default = "default_snapshot_interval_ms")]
    pub interval_ms: u64,

    /// Revisions since the last snapshot that force an early one.
    #[serde(default = "default_dirty_threshold")]
    pub dirty_threshold: u64,
}

impl SnapshotConfig {
    /// Interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_snapshot_interval_ms(),
            dirty_threshold: default_dirty_threshold(),
        }
    }
}

/// Query API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Bind address.
    #[serde(default = "default_query_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_query_port")]
    pub port: u16,

    /// Maximum wait for a read lock before answering 503.
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound on `k` for listing endpoints.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl QueryConfig {
    /// Read lock timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            host: default_query_host(),
            port: default_query_port(),
            timeout_ms: default_query_timeout_ms(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// Score validation and update semantics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScoringConfig {
    /// Smallest accepted score.
    #[serde(default = "default_min_score")]
    pub min_score: i64,

    /// Largest accepted score.
    #[serde(default = "default_max_score")]
    pub max_score: i64,

    /// How an event's score combines with the stored one.
    #[serde(default)]
    pub mode: UpdateMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_score: default_max_score(),
            mode: UpdateMode::default(),
        }
    }
}

/// Consumer retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsumerConfig {
    /// Maximum wait for the store write lock per attempt.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Retries after the first attempt before dead-lettering.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap on the retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl ConsumerConfig {
    /// Write lock timeout as a [`Duration`].
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Count-min sketch dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SketchConfig {
    /// Counters per row.
    #[serde(default = "default_sketch_width")]
    pub width: usize,

    /// Rows.
    #[serde(default = "default_sketch_depth")]
    pub depth: usize,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            width: default_sketch_width(),
            depth: default_sketch_depth(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_stream_name() -> String {
    "SCORES".to_owned()
}

fn default_subject() -> String {
    "scores.updates".to_owned()
}

fn default_storage_location() -> String {
    "file://./data/snapshots".to_owned()
}

const fn default_snapshot_interval_ms() -> u64 {
    30_000
}

const fn default_dirty_threshold() -> u64 {
    10_000
}

fn default_query_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_query_port() -> u16 {
    8080
}

const fn default_query_timeout_ms() -> u64 {
    250
}

const fn default_max_top_k() -> usize {
    1_000
}

const fn default_min_score() -> i64 {
    0
}

const fn default_max_score() -> i64 {
    1_000_000_000
}

const fn default_lock_timeout_ms() -> u64 {
    500
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_initial_backoff_ms() -> u64 {
    50
}

const fn default_max_backoff_ms() -> u64 {
    2_000
}

const fn default_sketch_width() -> usize {
    1_000
}

const fn default_sketch_depth() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = LeaderboardConfig::parse("").ok();
        assert_eq!(config, Some(LeaderboardConfig::default()));
        let config = LeaderboardConfig::default();
        assert_eq!(config.stream.url, "nats://localhost:4222");
        assert_eq!(config.sketch.width, 1_000);
        assert_eq!(config.sketch.depth, 5);
        assert_eq!(config.scoring.mode, UpdateMode::Overwrite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_sections() {
        let yaml = r"
stream:
  url: nats://stream:4222
  dead_letter_subject: scores.dead
scoring:
  min_score: -100
  max_score: 100
  mode: increment
query:
  port: 9090
logging:
  format: json
";
        let config = LeaderboardConfig::parse(yaml).ok();
        assert!(config.is_some());
        let config = config.unwrap_or_default();
        assert_eq!(config.stream.url, "nats://stream:4222");
        assert_eq!(config.stream.subject, "scores.updates");
        assert_eq!(config.stream.dead_letter_subject.as_deref(), Some("scores.dead"));
        assert_eq!(config.scoring.min_score, -100);
        assert_eq!(config.scoring.mode, UpdateMode::Increment);
        assert_eq!(config.query.port, 9090);
        assert_eq!(config.query.max_top_k, 1_000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = LeaderboardConfig::parse("scoring: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("NATS_URL", "nats://override:4222"),
            ("NATS_TOKEN", "secret"),
            ("SNAPSHOT_LOCATION", "postgres://db/leaderboard"),
            ("QUERY_PORT", "9999"),
            ("LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = LeaderboardConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.stream.url, "nats://override:4222");
        assert_eq!(config.stream.token.as_deref(), Some("secret"));
        assert_eq!(config.storage.location, "postgres://db/leaderboard");
        assert_eq!(config.query.port, 9999);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.stream.user, None);
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = LeaderboardConfig::default();
        config.apply_overrides_from(|key| (key == "QUERY_PORT").then(|| "http".to_owned()));
        assert_eq!(config.query.port, 8080);
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut config = LeaderboardConfig::default();
        config.scoring.min_score = 10;
        config.scoring.max_score = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_dimensions_and_limits() {
        let mut config = LeaderboardConfig::default();
        config.sketch.depth = 0;
        assert!(config.validate().is_err());

        let mut config = LeaderboardConfig::default();
        config.query.max_top_k = 0;
        assert!(config.validate().is_err());

        let mut config = LeaderboardConfig::default();
        config.snapshot.dirty_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = LeaderboardConfig::default();
        config.query.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
