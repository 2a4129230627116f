//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use logtap_core::types::StreamKind;

/// logtap: mirror a process's output into log files and syslog.
#[derive(Parser, Debug)]
#[command(name = "logtap", version, about)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "logtap.toml", global = true)]
    pub config: PathBuf,

    /// Override the agent's own diagnostic level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format for command results
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the effective forwarding configuration
    Status(StatusArgs),
    /// Persist `forwarder.enabled = true`
    Enable,
    /// Persist `forwarder.enabled = false`
    Disable,
    /// Validate or display the configuration file
    Config(ConfigArgs),
    /// Print (and optionally open) the log directory
    Logdir(LogdirArgs),
    /// Forward stdin through an intercepted stream
    Pipe(PipeArgs),
    /// Run a command and forward its stdout and stderr
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list every exclusion rule
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Check that the configuration loads and report lenient fallbacks
    Validate {
        /// Treat values that would fall back to defaults as errors
        #[arg(long)]
        strict: bool,
    },
    /// Print the effective configuration as TOML
    Show {
        /// Only print one section (general, forwarder)
        #[arg(long)]
        section: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct LogdirArgs {
    /// Create the directory if needed and open it in the platform file manager
    #[arg(long)]
    pub open: bool,
}

#[derive(Args, Debug)]
pub struct PipeArgs {
    /// Stream stdin is replayed on
    #[arg(long, default_value = "stdout")]
    pub stream: PipeStream,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Program and arguments, after `--`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PipeStream {
    Stdout,
    Stderr,
}

impl From<PipeStream> for StreamKind {
    fn from(stream: PipeStream) -> Self {
        match stream {
            PipeStream::Stdout => StreamKind::Stdout,
            PipeStream::Stderr => StreamKind::Stderr,
        }
    }
}
