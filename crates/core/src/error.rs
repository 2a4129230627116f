//! Error types shared across the logtap workspace.
//!
//! Every crate defines its own domain error and converts into [`LogtapError`]
//! at the crate boundary, so hosts only ever match on one type.

/// Top-level logtap error.
#[derive(Debug, thiserror::Error)]
pub enum LogtapError {
    /// Configuration could not be loaded, parsed, or persisted.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Forwarding pipeline failed to initialise or run.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error not covered by a more specific variant.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// The configuration file is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A value is outside of its accepted range.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The configuration file could not be rewritten.
    #[error("failed to write config {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Pipeline lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Start-up failed before the worker was spawned.
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// The background worker terminated abnormally.
    #[error("pipeline worker failed: {0}")]
    WorkerFailed(String),
}
