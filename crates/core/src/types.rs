//! Domain types shared by the forwarder and its hosts.
//!
//! [`LogMessage`] is what the interceptor captures, [`LogRecord`] is what the
//! dispatcher hands to sinks once a message has been classified.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Message severity.
///
/// Ordered `Debug < Info < Warning < Error < Critical`; minimum-severity
/// filtering compares with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// All levels, least severe first.
    pub const ALL: [Severity; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Canonical upper-case level name as written to sinks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parses a level name, ignoring case and surrounding whitespace.
    ///
    /// `WARN` and `FATAL` are accepted as aliases of `WARNING` and `CRITICAL`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "CRITICAL" | "FATAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Numeric syslog severity (RFC 5424 table 2).
    pub fn syslog_code(self) -> u8 {
        match self {
            Self::Debug => 7,
            Self::Info => 6,
            Self::Warning => 4,
            Self::Error => 3,
            Self::Critical => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which host stream a message was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single captured write.
///
/// The text is kept exactly as written (it may span several lines); it is
/// trimmed only when the dispatcher turns it into a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    stream: StreamKind,
    text: String,
}

impl LogMessage {
    pub fn new(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `true` when the message holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// A classified message ready for sink delivery.
///
/// The timestamp is taken when the dispatcher classifies the message, not
/// when it was captured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub stream: StreamKind,
    pub message: String,
}

impl LogRecord {
    /// Builds a record stamped with the current local time.
    pub fn now(severity: Severity, stream: StreamKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            stream,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.stream, self.message)
    }
}
