#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use error::{ConfigError, LogtapError, PipelineError};

pub use config::{ConfigSource, FileConfigSource, ForwarderConfig, GeneralConfig, LogtapConfig};

pub use pipeline::{BoxFuture, HealthStatus, Pipeline, PipelineState};

pub use types::{LogMessage, LogRecord, Severity, StreamKind};
