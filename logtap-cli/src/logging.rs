//! Diagnostic output for the logtap binary.
//!
//! The subscriber always writes to the process's real stderr. Forwarded
//! streams are separate `InterceptableStream` handles, so the agent's own
//! diagnostics never re-enter the forwarding pipeline.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logtap_core::config::GeneralConfig;

use crate::error::CliError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. `log_format` is
/// `"json"` or `"pretty"`.
pub fn init_tracing(config: &GeneralConfig) -> Result<(), CliError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => {
            return Err(CliError::Config(format!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            )));
        }
    };

    result.map_err(|e| CliError::Command(format!("failed to initialize tracing: {e}")))
}
