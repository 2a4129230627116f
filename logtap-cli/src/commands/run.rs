//! `logtap run` command handler
//!
//! Spawns the child with piped stdout and stderr and relays its output
//! through the matching intercepted stream. The child's exit code becomes
//! logtap's exit code.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use logtap_forwarder::InterceptableStream;

use crate::cli::RunArgs;
use crate::commands::session::{ForwardingSession, relay};
use crate::error::CliError;

pub async fn execute(args: RunArgs, config_path: &Path) -> Result<i32, CliError> {
    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::Command("no command given".to_owned()))?;

    let stdout = InterceptableStream::stdout();
    let stderr = InterceptableStream::stderr();
    let session = ForwardingSession::start(config_path, vec![stdout.clone(), stderr.clone()]).await;

    let spawned = Command::new(program)
        .args(rest)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            session.finish().await?;
            return Err(CliError::Command(format!("failed to run {program}: {e}")));
        }
    };
    info!(program = program.as_str(), pid = child.id(), "child started");

    let relays: Vec<JoinHandle<std::io::Result<u64>>> = [
        child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(relay(pipe, stdout))),
        child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(relay(pipe, stderr))),
    ]
    .into_iter()
    .flatten()
    .collect();

    // The child receives the same interrupt; keep waiting so its last
    // output is still relayed.
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = tokio::signal::ctrl_c() => debug!("interrupt received, waiting for child"),
        }
    };

    for relay in relays {
        match relay.await {
            Ok(Ok(bytes)) => debug!(bytes, "relay finished"),
            Ok(Err(e)) => warn!(error = %e, "relay stopped early"),
            Err(e) => warn!(error = %e, "relay task failed"),
        }
    }

    session.finish().await?;
    let status = status?;
    info!(%status, "child exited");
    Ok(exit_code(status))
}

/// Exit code to propagate. A child killed by a signal maps to `128 + signo`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
