//! Configuration: `logtap.toml` parsing, environment overrides, persistence.
//!
//! [`LogtapConfig`] is the raw, serde-facing configuration. It is deliberately
//! lenient: pattern syntax, facility names, and severity names are kept as
//! strings here and resolved by the forwarder, which falls back to defaults
//! instead of refusing to start. [`LogtapConfig::load`] does the same for the
//! `[general]` section; [`LogtapConfig::validate`] is the strict check behind
//! `logtap config validate --strict`.
//!
//! # Precedence
//! 1. Environment (`LOGTAP_FORWARDER_SYSLOG_HOST=collector` style)
//! 2. Configuration file (`logtap.toml`)
//! 3. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), logtap_core::error::LogtapError> {
//! use logtap_core::config::LogtapConfig;
//!
//! let config = LogtapConfig::load("logtap.toml").await?;
//! let inline = LogtapConfig::parse("[forwarder]\nsyslog_enabled = true")?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogtapError};

/// Default configuration file name looked up by hosts.
pub const DEFAULT_CONFIG_FILE: &str = "logtap.toml";

/// Accepted `general.log_level` values.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Accepted `general.log_format` values.
pub const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// Top-level `logtap.toml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogtapConfig {
    /// Diagnostics of the agent itself.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Capture, filtering, and sink settings.
    #[serde(default)]
    pub forwarder: ForwarderConfig,
}

impl LogtapConfig {
    /// Loads the file and applies environment overrides.
    ///
    /// Only an unreadable or unparsable file is an error. Unusable `[general]`
    /// values are replaced by defaults with a warning; forwarder values are
    /// resolved leniently when a session starts.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogtapError> {
        let mut config = Self::load_raw(path).await?;
        for replaced in config.apply_general_fallbacks() {
            warn!(%replaced, "config value replaced by default");
        }
        Ok(config)
    }

    /// Loads the file and applies environment overrides, keeping every value as written.
    pub async fn load_raw(path: impl AsRef<Path>) -> Result<Self, LogtapError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads the file as written, without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogtapError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogtapError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogtapError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML document. Missing sections and fields take defaults.
    pub fn parse(toml_str: &str) -> Result<Self, LogtapError> {
        toml::from_str(toml_str).map_err(|e| {
            LogtapError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Serialises back to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, LogtapError> {
        toml::to_string_pretty(self).map_err(|e| {
            LogtapError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides values from the environment.
    ///
    /// Naming: `LOGTAP_{SECTION}_{FIELD}`, e.g. `LOGTAP_FORWARDER_SYSLOG_PORT=5514`.
    /// List fields take comma-separated values.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGTAP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGTAP_GENERAL_LOG_FORMAT");

        let fwd = &mut self.forwarder;
        override_bool(&mut fwd.enabled, "LOGTAP_FORWARDER_ENABLED");
        override_usize(
            &mut fwd.buffer_capacity,
            "LOGTAP_FORWARDER_BUFFER_CAPACITY",
        );
        override_u64(
            &mut fwd.poll_interval_ms,
            "LOGTAP_FORWARDER_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut fwd.shutdown_timeout_ms,
            "LOGTAP_FORWARDER_SHUTDOWN_TIMEOUT_MS",
        );
        override_string(
            &mut fwd.min_severity_level,
            "LOGTAP_FORWARDER_MIN_SEVERITY_LEVEL",
        );
        override_csv(
            &mut fwd.exclude_wildcards,
            "LOGTAP_FORWARDER_EXCLUDE_WILDCARDS",
        );
        override_csv(
            &mut fwd.exclude_patterns,
            "LOGTAP_FORWARDER_EXCLUDE_PATTERNS",
        );
        override_csv(&mut fwd.exclude_regex, "LOGTAP_FORWARDER_EXCLUDE_REGEX");

        // File sink
        override_bool(
            &mut fwd.file_logging_enabled,
            "LOGTAP_FORWARDER_FILE_LOGGING_ENABLED",
        );
        override_string(&mut fwd.log_directory, "LOGTAP_FORWARDER_LOG_DIRECTORY");
        override_string(
            &mut fwd.log_filename_pattern,
            "LOGTAP_FORWARDER_LOG_FILENAME_PATTERN",
        );
        override_u64(
            &mut fwd.max_file_size_mb,
            "LOGTAP_FORWARDER_MAX_FILE_SIZE_MB",
        );
        override_u32(&mut fwd.backup_count, "LOGTAP_FORWARDER_BACKUP_COUNT");
        override_string(&mut fwd.file_encoding, "LOGTAP_FORWARDER_FILE_ENCODING");
        override_string(
            &mut fwd.file_log_format,
            "LOGTAP_FORWARDER_FILE_LOG_FORMAT",
        );

        // Syslog sink
        override_bool(&mut fwd.syslog_enabled, "LOGTAP_FORWARDER_SYSLOG_ENABLED");
        override_string(&mut fwd.syslog_host, "LOGTAP_FORWARDER_SYSLOG_HOST");
        override_u16(&mut fwd.syslog_port, "LOGTAP_FORWARDER_SYSLOG_PORT");
        override_string(
            &mut fwd.syslog_facility,
            "LOGTAP_FORWARDER_SYSLOG_FACILITY",
        );
        override_string(&mut fwd.syslog_format, "LOGTAP_FORWARDER_SYSLOG_FORMAT");
        override_u64(
            &mut fwd.syslog_timeout_ms,
            "LOGTAP_FORWARDER_SYSLOG_TIMEOUT_MS",
        );
        override_bool(
            &mut fwd.syslog_append_nul,
            "LOGTAP_FORWARDER_SYSLOG_APPEND_NUL",
        );
    }

    /// Replaces an unknown `general.log_level` or `general.log_format` with
    /// its default and returns one `InvalidValue` per replacement.
    pub fn apply_general_fallbacks(&mut self) -> Vec<ConfigError> {
        let defaults = GeneralConfig::default();
        let mut replaced = Vec::new();

        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            replaced.push(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!(
                    "'{}' is not one of {}, using {}",
                    self.general.log_level,
                    LOG_LEVELS.join(", "),
                    defaults.log_level
                ),
            });
            self.general.log_level = defaults.log_level;
        }

        if !LOG_FORMATS.contains(&self.general.log_format.as_str()) {
            replaced.push(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!(
                    "'{}' is not one of {}, using {}",
                    self.general.log_format,
                    LOG_FORMATS.join(", "),
                    defaults.log_format
                ),
            });
            self.general.log_format = defaults.log_format;
        }

        replaced
    }

    /// Strict check: rejects every value that [`load`](Self::load) or the
    /// forwarder would otherwise replace with a default.
    pub fn validate(&self) -> Result<(), LogtapError> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", LOG_LEVELS.join(", ")),
            }
            .into());
        }

        if !LOG_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", LOG_FORMATS.join(", ")),
            }
            .into());
        }

        let positive = [
            ("forwarder.buffer_capacity", self.forwarder.buffer_capacity as u64),
            ("forwarder.poll_interval_ms", self.forwarder.poll_interval_ms),
            (
                "forwarder.shutdown_timeout_ms",
                self.forwarder.shutdown_timeout_ms,
            ),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Persists `forwarder.enabled` to `path`.
    ///
    /// A missing file is created from defaults. The document is rewritten via
    /// a sibling temporary file and a rename, so readers never observe a
    /// truncated file. Comments in the original file are not preserved.
    pub async fn set_enabled(path: impl AsRef<Path>, enabled: bool) -> Result<Self, LogtapError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(LogtapError::Config(ConfigError::FileNotFound { .. })) => Self::default(),
            Err(e) => return Err(e),
        };
        config.forwarder.enabled = enabled;

        let body = config.to_toml_string()?;
        let write_err = |e: std::io::Error| ConfigError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let tmp = path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, body).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        Ok(config)
    }
}

/// Agent diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `tracing` level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Diagnostic output format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Forwarder settings as written in `[forwarder]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Master switch. When false, `start()` does nothing.
    pub enabled: bool,
    /// Buffer capacity in messages.
    pub buffer_capacity: usize,
    /// Dispatcher polling interval.
    pub poll_interval_ms: u64,
    /// How long `stop()` waits for the worker's final pass.
    pub shutdown_timeout_ms: u64,
    /// Minimum severity name. Unknown names fall back to DEBUG.
    pub min_severity_level: String,
    /// Shell-glob exclusion rules, matched against the whole trimmed message.
    pub exclude_wildcards: Vec<String>,
    /// Substring exclusion rules.
    pub exclude_patterns: Vec<String>,
    /// Regular-expression exclusion rules (unanchored search).
    pub exclude_regex: Vec<String>,

    pub file_logging_enabled: bool,
    /// Log directory. A leading `~` expands to the home directory.
    pub log_directory: String,
    /// File name; `{date}` becomes `YYYYMMDD` when the sink opens.
    pub log_filename_pattern: String,
    /// Rotation threshold. 0 disables rotation.
    pub max_file_size_mb: u64,
    /// Rotated files kept. 0 disables rotation.
    pub backup_count: u32,
    pub file_encoding: String,
    /// Tokens: `{timestamp}`, `{level}`, `{message}`, `{pid}`, `{stream}`.
    pub file_log_format: String,

    pub syslog_enabled: bool,
    pub syslog_host: String,
    pub syslog_port: u16,
    /// Facility name such as `LOG_USER` or `local3`. Unknown names fall back to LOG_USER.
    pub syslog_facility: String,
    /// Tokens: `{timestamp}`, `{level}`, `{message}`, `{pid}`, `{stream}`.
    pub syslog_format: String,
    /// Bound on a single lookup + send.
    pub syslog_timeout_ms: u64,
    /// Terminate every datagram with a NUL byte.
    pub syslog_append_nul: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_capacity: 10_000,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 2_000,
            min_severity_level: "DEBUG".to_owned(),
            exclude_wildcards: Vec::new(),
            exclude_patterns: Vec::new(),
            exclude_regex: Vec::new(),
            file_logging_enabled: true,
            log_directory: "~/.logtap/logs".to_owned(),
            log_filename_pattern: "logtap_{date}.log".to_owned(),
            max_file_size_mb: 10,
            backup_count: 5,
            file_encoding: "utf-8".to_owned(),
            file_log_format: "{timestamp} - {level} - {message}".to_owned(),
            syslog_enabled: false,
            syslog_host: "localhost".to_owned(),
            syslog_port: 514,
            syslog_facility: "LOG_USER".to_owned(),
            syslog_format: "logtap[{pid}]: {level} - {message}".to_owned(),
            syslog_timeout_ms: 5_000,
            syslog_append_nul: true,
        }
    }
}

impl ForwarderConfig {
    /// `log_directory` with `~` expanded.
    pub fn resolved_log_directory(&self) -> PathBuf {
        expand_tilde(&self.log_directory)
    }

    /// Rotation threshold in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// `host:port` of the syslog collector.
    pub fn syslog_target(&self) -> String {
        format!("{}:{}", self.syslog_host, self.syslog_port)
    }
}

/// Expands a leading `~` or `~/` to the current user's home directory.
///
/// Paths without a leading tilde, and `~user` forms, are returned unchanged.
/// If the home directory cannot be determined the path is returned as is.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

/// Supplies a configuration snapshot on every start and reload.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<LogtapConfig, LogtapError>> + Send;

    /// Human-readable origin, for diagnostics.
    fn describe(&self) -> String;
}

/// Re-reads a TOML file (plus environment overrides) on every load.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<LogtapConfig, LogtapError> {
        LogtapConfig::load(&self.path).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A fixed in-memory snapshot.
impl ConfigSource for LogtapConfig {
    async fn load(&self) -> Result<LogtapConfig, LogtapError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        "in-memory".to_owned()
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, kind: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                kind,
                "failed to parse number from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
