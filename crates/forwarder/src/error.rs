//! Forwarder error type
//!
//! [`ForwarderError`] covers sink construction, sink delivery, and rule
//! compilation. Delivery errors never leave the sink set: they are counted
//! there and discarded. `From<ForwarderError> for LogtapError` lets start-up
//! failures propagate with `?`.

use logtap_core::error::{LogtapError, PipelineError};

#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    /// A sink could not be opened (directory not writable, socket bind failed).
    #[error("sink open failed: {sink}: {reason}")]
    SinkOpen { sink: String, reason: String },

    /// A single delivery failed.
    #[error("sink emit failed: {sink}: {reason}")]
    SinkEmit { sink: String, reason: String },

    /// A delivery did not finish within the sink's timeout.
    #[error("sink timed out: {sink} after {timeout_ms}ms")]
    SinkTimeout { sink: String, timeout_ms: u64 },

    /// The sink was already closed.
    #[error("sink closed: {0}")]
    SinkClosed(String),

    /// A configuration value was rejected during resolution.
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<ForwarderError> for LogtapError {
    fn from(err: ForwarderError) -> Self {
        LogtapError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
