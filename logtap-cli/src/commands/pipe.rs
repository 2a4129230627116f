//! `logtap pipe` command handler
//!
//! `producer | logtap pipe` replays stdin on stdout (or stderr) through an
//! intercepted stream, so the producer's output is both shown and forwarded.

use std::path::Path;

use tracing::{debug, info};

use logtap_forwarder::InterceptableStream;

use crate::cli::{PipeArgs, PipeStream};
use crate::commands::session::{ForwardingSession, relay};
use crate::error::CliError;

pub async fn execute(args: PipeArgs, config_path: &Path) -> Result<(), CliError> {
    let stream = match args.stream {
        PipeStream::Stdout => InterceptableStream::stdout(),
        PipeStream::Stderr => InterceptableStream::stderr(),
    };
    let session = ForwardingSession::start(config_path, vec![stream.clone()]).await;

    let relayed = tokio::select! {
        copied = relay(tokio::io::stdin(), stream) => copied.map(Some),
        _ = tokio::signal::ctrl_c() => Ok(None),
    };

    // Stop even if the relay failed, so buffered messages still reach the sinks.
    let status = session.finish().await?;
    match relayed? {
        Some(bytes) => debug!(bytes, "stdin closed"),
        None => info!("interrupted"),
    }
    debug!(dispatched = status.dispatch.dispatched, "pipe finished");
    Ok(())
}
