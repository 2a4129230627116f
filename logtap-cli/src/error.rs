//! CLI error type and exit code mapping

use logtap_core::error::LogtapError;

/// Errors surfaced to the user by `main`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logtap-core.
    #[error("{0}")]
    Core(#[from] LogtapError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                    |
    /// |------|----------------------------|
    /// | 0    | Success                    |
    /// | 1    | General / command error    |
    /// | 2    | Configuration error        |
    /// | 10   | IO error                   |
    ///
    /// `logtap run` exits with the child's own code instead.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(LogtapError::Config(_)) => 2,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}
