//! Forwarder lifetime shared by `pipe` and `run`.

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use logtap_core::config::FileConfigSource;
use logtap_forwarder::{ForwarderHandle, ForwarderStatus, InterceptableStream, LogForwarder};

use crate::error::CliError;

const RELAY_CHUNK: usize = 8 * 1024;

/// A started forwarder plus its `SIGHUP` reload listener.
pub(crate) struct ForwardingSession {
    handle: ForwarderHandle<FileConfigSource>,
    reloader: Option<JoinHandle<()>>,
}

impl ForwardingSession {
    /// Builds a forwarder over `streams` and starts it.
    ///
    /// A failed start is logged and the streams stay in passthrough, so the
    /// relayed output is never lost. A later `SIGHUP` retries.
    pub(crate) async fn start(config_path: &Path, streams: Vec<InterceptableStream>) -> Self {
        let forwarder = streams
            .into_iter()
            .fold(LogForwarder::new(FileConfigSource::new(config_path)), |fwd, stream| {
                fwd.with_stream(stream)
            });
        let handle = ForwarderHandle::new(forwarder);

        if let Err(e) = handle.start().await {
            warn!(error = %e, "forwarder did not start, output is passed through only");
        }

        let reloader = spawn_reloader(handle.clone());
        Self { handle, reloader }
    }

    /// Stops the reload listener and the forwarder, returning final counters.
    pub(crate) async fn finish(mut self) -> Result<ForwarderStatus, CliError> {
        if let Some(reloader) = self.reloader.take() {
            reloader.abort();
        }
        self.handle.stop().await?;
        let status = self.handle.status().await;
        debug!(
            captured = status.captured,
            evicted = status.evicted,
            dispatched = status.dispatch.dispatched,
            "forwarding session finished"
        );
        Ok(status)
    }
}

#[cfg(unix)]
fn spawn_reloader(handle: ForwarderHandle<FileConfigSource>) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "failed to install SIGHUP handler, reload disabled");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading configuration");
            if let Err(e) = handle.reload().await {
                warn!(error = %e, "reload failed, forwarding stays stopped");
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_reloader(_handle: ForwarderHandle<FileConfigSource>) -> Option<JoinHandle<()>> {
    None
}

/// Copies `reader` to `out` as data arrives. Returns the bytes copied.
///
/// Each read is written with a single `write_all`, so an intercepted stream
/// captures it as one message. Output without a trailing newline, such as an
/// interactive prompt, is passed on without waiting for more input.
pub(crate) async fn relay<R, W>(mut reader: R, mut out: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut chunk = vec![0u8; RELAY_CHUNK];
    let mut copied = 0u64;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        out.write_all(&chunk[..n])?;
        out.flush()?;
        copied += n as u64;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtap_core::types::StreamKind;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncWriteExt;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<Vec<u8>>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn relay_writes_each_read_in_one_call() {
        let out = Shared::default();
        let copied = relay(&b"one\ntwo\nlast"[..], out.clone()).await.unwrap();

        assert_eq!(copied, 12);
        assert_eq!(*out.0.lock().unwrap(), vec![b"one\ntwo\nlast".to_vec()]);
    }

    #[tokio::test]
    async fn prompt_without_newline_is_relayed_while_input_stays_open() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let out = Shared::default();
        let task = tokio::spawn(relay(reader, out.clone()));

        writer.write_all(b"Password: ").await.unwrap();
        let mut seen = false;
        for _ in 0..100 {
            if out.0.lock().unwrap().concat() == b"Password: " {
                seen = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(seen, "prompt was held back until more input arrived");

        writer.write_all(b"ok\n").await.unwrap();
        drop(writer);
        let copied = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(copied, 13);
        assert_eq!(
            *out.0.lock().unwrap(),
            vec![b"Password: ".to_vec(), b"ok\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn relay_of_empty_input_copies_nothing() {
        let out = Shared::default();
        assert_eq!(relay(&b""[..], out.clone()).await.unwrap(), 0);
        assert!(out.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_with_missing_config_still_passes_output_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = Shared::default();
        let stream = InterceptableStream::new(StreamKind::Stdout, out.clone());

        let session = ForwardingSession::start(&dir.path().join("absent.toml"), vec![stream.clone()]).await;
        assert!(!stream.is_intercepted());

        relay(&b"hello\n"[..], stream.clone()).await.unwrap();
        let status = session.finish().await.unwrap();

        assert_eq!(status.captured, 0);
        assert_eq!(*out.0.lock().unwrap(), vec![b"hello\n".to_vec()]);
    }

    #[tokio::test]
    async fn session_forwards_relayed_output_to_the_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("logtap.toml");
        let log_dir = dir.path().join("logs");
        std::fs::write(
            &config_path,
            format!(
                "[forwarder]\nlog_directory = {:?}\nlog_filename_pattern = \"out.log\"\nfile_log_format = \"{{level}} {{message}}\"\n",
                log_dir.display().to_string()
            ),
        )
        .unwrap();

        let out = Shared::default();
        let stream = InterceptableStream::new(StreamKind::Stdout, out.clone());
        let session = ForwardingSession::start(&config_path, vec![stream.clone()]).await;
        assert!(stream.is_intercepted());

        relay(&b"WARNING low disk\n"[..], stream.clone()).await.unwrap();
        let status = session.finish().await.unwrap();

        assert_eq!(status.captured, 1);
        assert_eq!(
            std::fs::read_to_string(log_dir.join("out.log")).unwrap(),
            "WARNING WARNING low disk\n"
        );
    }
}
