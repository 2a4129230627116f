//! Resolution of a [`ForwarderConfig`] into immutable runtime settings.
//!
//! Resolution is lenient: a value the forwarder cannot use is replaced by
//! its documented default and reported as a [`ConfigWarning`] instead of
//! failing start-up. Only an unreadable or unparsable configuration file
//! stops the forwarder, and that happens before resolution.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use logtap_core::config::ForwarderConfig;
use logtap_core::types::Severity;

use crate::filter::ExclusionFilter;
use crate::format::MessageFormat;
use crate::sink::file::FileSinkSettings;
use crate::sink::syslog::{Facility, SyslogSinkSettings};

const DEFAULT_BUFFER_CAPACITY: usize = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_SYSLOG_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FILENAME_PATTERN: &str = "logtap_{date}.log";

/// A configuration value that was replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: String,
    pub reason: String,
}

impl ConfigWarning {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Everything one forwarding session needs, fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub enabled: bool,
    pub buffer_capacity: usize,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub min_severity: Severity,
    pub filter: ExclusionFilter,
    /// `None` when file logging is disabled.
    pub file: Option<FileSinkSettings>,
    /// `None` when syslog forwarding is disabled.
    pub syslog: Option<SyslogSinkSettings>,
}

impl ForwarderSettings {
    /// Resolves `config`, logging each fallback at `warn`.
    pub fn from_config(config: &ForwarderConfig) -> Self {
        let (settings, warnings) = Self::resolve(config);
        for warning in &warnings {
            warn!(field = %warning.field, reason = %warning.reason, "config value replaced by default");
        }
        settings
    }

    /// Resolves `config` and returns the fallbacks that were applied.
    pub fn resolve(config: &ForwarderConfig) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let buffer_capacity = if config.buffer_capacity == 0 {
            warnings.push(ConfigWarning::new(
                "buffer_capacity",
                format!("must be > 0, using {DEFAULT_BUFFER_CAPACITY}"),
            ));
            DEFAULT_BUFFER_CAPACITY
        } else {
            config.buffer_capacity
        };

        let poll_interval = millis_or_default(
            "poll_interval_ms",
            config.poll_interval_ms,
            DEFAULT_POLL_INTERVAL_MS,
            &mut warnings,
        );
        let shutdown_timeout = millis_or_default(
            "shutdown_timeout_ms",
            config.shutdown_timeout_ms,
            DEFAULT_SHUTDOWN_TIMEOUT_MS,
            &mut warnings,
        );

        let min_severity = Severity::from_name(&config.min_severity_level).unwrap_or_else(|| {
            warnings.push(ConfigWarning::new(
                "min_severity_level",
                format!("unknown level '{}', using DEBUG", config.min_severity_level),
            ));
            Severity::Debug
        });

        let (filter, rejected) = ExclusionFilter::build(
            &config.exclude_wildcards,
            &config.exclude_patterns,
            &config.exclude_regex,
        );
        warnings.extend(rejected.into_iter().map(|rule| {
            ConfigWarning::new(
                rule.field,
                format!("rule '{}' skipped: {}", rule.rule, rule.error),
            )
        }));

        let file = config
            .file_logging_enabled
            .then(|| resolve_file(config, &mut warnings));
        let syslog = config
            .syslog_enabled
            .then(|| resolve_syslog(config, &mut warnings));

        let settings = Self {
            enabled: config.enabled,
            buffer_capacity,
            poll_interval,
            shutdown_timeout,
            min_severity,
            filter,
            file,
            syslog,
        };
        (settings, warnings)
    }

    /// `true` if at least one sink is enabled.
    pub fn has_sinks(&self) -> bool {
        self.file.is_some() || self.syslog.is_some()
    }
}

fn resolve_file(config: &ForwarderConfig, warnings: &mut Vec<ConfigWarning>) -> FileSinkSettings {
    if !is_utf8(&config.file_encoding) {
        warnings.push(ConfigWarning::new(
            "file_encoding",
            format!("unsupported encoding '{}', using utf-8", config.file_encoding),
        ));
    }

    let filename_pattern = if config.log_filename_pattern.trim().is_empty() {
        warnings.push(ConfigWarning::new(
            "log_filename_pattern",
            format!("empty pattern, using {DEFAULT_FILENAME_PATTERN}"),
        ));
        DEFAULT_FILENAME_PATTERN.to_owned()
    } else {
        config.log_filename_pattern.clone()
    };

    FileSinkSettings {
        directory: config.resolved_log_directory(),
        filename_pattern,
        max_bytes: config.max_file_bytes(),
        backup_count: config.backup_count,
        format: parse_format("file_log_format", &config.file_log_format, warnings),
    }
}

fn resolve_syslog(
    config: &ForwarderConfig,
    warnings: &mut Vec<ConfigWarning>,
) -> SyslogSinkSettings {
    let facility = Facility::from_name(&config.syslog_facility).unwrap_or_else(|| {
        warnings.push(ConfigWarning::new(
            "syslog_facility",
            format!("unknown facility '{}', using LOG_USER", config.syslog_facility),
        ));
        Facility::USER
    });

    let host = if config.syslog_host.trim().is_empty() {
        warnings.push(ConfigWarning::new("syslog_host", "empty host, using localhost"));
        "localhost".to_owned()
    } else {
        config.syslog_host.trim().to_owned()
    };

    SyslogSinkSettings {
        host,
        port: config.syslog_port,
        facility,
        format: parse_format("syslog_format", &config.syslog_format, warnings),
        timeout: millis_or_default(
            "syslog_timeout_ms",
            config.syslog_timeout_ms,
            DEFAULT_SYSLOG_TIMEOUT_MS,
            warnings,
        ),
        append_nul: config.syslog_append_nul,
    }
}

/// Templates without `{message}` are kept as written, but almost always a mistake.
fn parse_format(field: &str, template: &str, warnings: &mut Vec<ConfigWarning>) -> MessageFormat {
    let format = MessageFormat::parse(template);
    if !format.has_message() {
        warnings.push(ConfigWarning::new(
            field,
            "template has no {message} token, records will not carry their text",
        ));
    }
    format
}

fn millis_or_default(
    field: &str,
    value: u64,
    default: u64,
    warnings: &mut Vec<ConfigWarning>,
) -> Duration {
    if value == 0 {
        warnings.push(ConfigWarning::new(field, format!("must be > 0, using {default}")));
        Duration::from_millis(default)
    } else {
        Duration::from_millis(value)
    }
}

fn is_utf8(encoding: &str) -> bool {
    matches!(
        encoding.trim().to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "utf_8"
    )
}
