//! Syslog sink over UDP.
//!
//! One datagram per record:
//!
//! ```text
//! <PRI>formatted-message[\0]
//! ```
//!
//! PRI is `facility * 8 + severity` with the severity codes of RFC 5424.
//! The destination is resolved on first use and cached; each resolve plus
//! send is bounded by the configured timeout, so an unreachable collector
//! costs at most one timeout per record.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::net::UdpSocket;

use logtap_core::types::{LogRecord, Severity};

use crate::error::ForwarderError;
use crate::format::MessageFormat;
use crate::sink::Sink;

const SINK_NAME: &str = "syslog";

/// Syslog facility code (0..=23).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Facility(u8);

const FACILITY_NAMES: [&str; 24] = [
    "LOG_KERN",
    "LOG_USER",
    "LOG_MAIL",
    "LOG_DAEMON",
    "LOG_AUTH",
    "LOG_SYSLOG",
    "LOG_LPR",
    "LOG_NEWS",
    "LOG_UUCP",
    "LOG_CRON",
    "LOG_AUTHPRIV",
    "LOG_FTP",
    "LOG_NTP",
    "LOG_SECURITY",
    "LOG_CONSOLE",
    "LOG_SOLCRON",
    "LOG_LOCAL0",
    "LOG_LOCAL1",
    "LOG_LOCAL2",
    "LOG_LOCAL3",
    "LOG_LOCAL4",
    "LOG_LOCAL5",
    "LOG_LOCAL6",
    "LOG_LOCAL7",
];

impl Facility {
    pub const KERN: Facility = Facility(0);
    pub const USER: Facility = Facility(1);
    pub const DAEMON: Facility = Facility(3);
    pub const LOCAL0: Facility = Facility(16);
    pub const LOCAL7: Facility = Facility(23);

    /// Parses `LOG_USER`, `user`, `local3`, ... (case-insensitive, `LOG_` optional).
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("LOG_").unwrap_or(&upper);
        FACILITY_NAMES
            .iter()
            .position(|n| n.strip_prefix("LOG_") == Some(bare))
            .and_then(|code| u8::try_from(code).ok())
            .map(Facility)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// Canonical `LOG_*` name.
    pub fn name(self) -> &'static str {
        FACILITY_NAMES
            .get(usize::from(self.0))
            .copied()
            .unwrap_or("LOG_USER")
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// PRI value for a facility/severity pair.
pub fn encode_pri(facility: Facility, severity: Severity) -> u8 {
    facility.code() * 8 + severity.syslog_code()
}

/// Resolved syslog sink settings.
#[derive(Debug, Clone)]
pub struct SyslogSinkSettings {
    pub host: String,
    pub port: u16,
    pub facility: Facility,
    pub format: MessageFormat,
    pub timeout: Duration,
    pub append_nul: bool,
}

impl SyslogSinkSettings {
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sends formatted records as UDP datagrams.
#[derive(Debug)]
pub struct SyslogSink {
    settings: SyslogSinkSettings,
    destination: Option<SocketAddr>,
    socket: Option<UdpSocket>,
    closed: bool,
}

impl SyslogSink {
    /// Creates the sink. No I/O happens until the first emit.
    pub fn new(settings: SyslogSinkSettings) -> Self {
        Self {
            settings,
            destination: None,
            socket: None,
            closed: false,
        }
    }

    /// Encodes one record as a datagram payload.
    pub fn encode(&self, record: &LogRecord) -> Vec<u8> {
        let body = self.settings.format.render(record);
        let pri = encode_pri(self.settings.facility, record.severity);
        let mut payload = format!("<{pri}>{body}").into_bytes();
        if self.settings.append_nul {
            payload.push(0);
        }
        payload
    }

    async fn resolve(&mut self) -> io::Result<SocketAddr> {
        if let Some(addr) = self.destination {
            return Ok(addr);
        }
        let addr = tokio::net::lookup_host((self.settings.host.as_str(), self.settings.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address for {}", self.settings.host),
                )
            })?;
        self.destination = Some(addr);
        Ok(addr)
    }

    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        let destination = self.resolve().await?;
        if self.socket.is_none() {
            let bind: SocketAddr = if destination.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            self.socket = Some(UdpSocket::bind(bind).await?);
        }
        let Some(socket) = self.socket.as_ref() else {
            return Err(io::Error::other("syslog socket unavailable"));
        };
        socket.send_to(payload, destination).await?;
        Ok(())
    }
}

impl Sink for SyslogSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn target(&self) -> String {
        self.settings.target()
    }

    async fn emit(&mut self, record: &LogRecord) -> Result<(), ForwarderError> {
        if self.closed {
            return Err(ForwarderError::SinkClosed(SINK_NAME.to_owned()));
        }
        let payload = self.encode(record);
        let timeout = self.settings.timeout;
        match tokio::time::timeout(timeout, self.send(&payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ForwarderError::SinkEmit {
                sink: SINK_NAME.to_owned(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ForwarderError::SinkTimeout {
                sink: SINK_NAME.to_owned(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn close(&mut self) -> Result<(), ForwarderError> {
        self.closed = true;
        self.socket = None;
        Ok(())
    }
}
