//! End-to-end forwarding tests
//!
//! Drive a real `LogForwarder` through fake host streams into the file sink
//! and a local UDP collector.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::net::UdpSocket;

use logtap_core::config::{FileConfigSource, LogtapConfig};
use logtap_core::pipeline::{Pipeline, PipelineState};
use logtap_core::types::StreamKind;
use logtap_forwarder::{ForwarderHandle, InterceptableStream, LogForwarder};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn base_config(dir: &Path) -> LogtapConfig {
    let mut config = LogtapConfig::default();
    config.forwarder.log_directory = dir.display().to_string();
    config.forwarder.log_filename_pattern = "app.log".to_owned();
    config.forwarder.file_log_format = "{level} {stream} {message}".to_owned();
    config.forwarder.poll_interval_ms = 20;
    config
}

fn host_streams() -> (InterceptableStream, Captured, InterceptableStream, Captured) {
    let out = Captured::default();
    let err = Captured::default();
    (
        InterceptableStream::new(StreamKind::Stdout, out.clone()),
        out,
        InterceptableStream::new(StreamKind::Stderr, err.clone()),
        err,
    )
}

fn read_log(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("app.log")).unwrap_or_default()
}

#[tokio::test]
async fn error_passes_warning_threshold_to_file_and_syslog() {
    let dir = TempDir::new().unwrap();
    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut config = base_config(dir.path());
    config.forwarder.min_severity_level = "WARNING".to_owned();
    config.forwarder.syslog_enabled = true;
    config.forwarder.syslog_host = "127.0.0.1".to_owned();
    config.forwarder.syslog_port = collector.local_addr().unwrap().port();
    config.forwarder.syslog_format = "app: {level} - {message}".to_owned();

    let (mut stdout, out, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(config).with_stream(stdout.clone());
    forwarder.start().await.unwrap();

    writeln!(stdout, "just saying hi").unwrap();
    writeln!(stdout, "ERROR: disk full").unwrap();
    forwarder.stop().await.unwrap();

    assert_eq!(out.text(), "just saying hi\nERROR: disk full\n");
    assert_eq!(read_log(dir.path()), "ERROR stdout ERROR: disk full\n");

    let mut buf = [0u8; 256];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), collector.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..n], b"<11>app: ERROR - ERROR: disk full\0");
}

#[tokio::test]
async fn excluded_messages_never_reach_sinks() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(dir.path());
    config.forwarder.exclude_wildcards = vec!["reloading plugin *".to_owned()];
    config.forwarder.exclude_patterns = vec!["heartbeat".to_owned()];
    config.forwarder.exclude_regex = vec![r"^GET /health".to_owned()];

    let (mut stdout, _, mut stderr, _) = host_streams();
    let mut forwarder = LogForwarder::new(config)
        .with_stream(stdout.clone())
        .with_stream(stderr.clone());
    forwarder.start().await.unwrap();

    writeln!(stdout, "reloading plugin foo").unwrap();
    writeln!(stdout, "CRITICAL heartbeat lost").unwrap();
    writeln!(stdout, "GET /health 200").unwrap();
    writeln!(stderr, "kept").unwrap();
    forwarder.stop().await.unwrap();

    assert_eq!(read_log(dir.path()), "INFO stderr kept\n");
    let stats = forwarder.dispatch_stats();
    assert_eq!(stats.excluded, 3);
    assert_eq!(stats.dispatched, 1);
}

#[tokio::test]
async fn overflow_keeps_most_recent_messages() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(dir.path());
    config.forwarder.buffer_capacity = 2;
    config.forwarder.poll_interval_ms = 60_000;

    let (mut stdout, out, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(config).with_stream(stdout.clone());
    forwarder.start().await.unwrap();
    // Let the worker consume its immediate first tick.
    tokio::time::sleep(Duration::from_millis(50)).await;

    for word in ["a", "b", "c"] {
        writeln!(stdout, "{word}").unwrap();
    }
    let status = forwarder.status();
    assert_eq!(status.evicted, 1);
    forwarder.stop().await.unwrap();

    assert_eq!(out.text(), "a\nb\nc\n");
    assert_eq!(read_log(dir.path()), "INFO stdout b\nINFO stdout c\n");
}

#[tokio::test]
async fn stop_twice_restores_streams_and_terminates() {
    let dir = TempDir::new().unwrap();
    let (mut stdout, out, stderr, _) = host_streams();
    let mut forwarder = LogForwarder::new(base_config(dir.path()))
        .with_stream(stdout.clone())
        .with_stream(stderr.clone());

    forwarder.start().await.unwrap();
    assert!(stdout.is_intercepted() && stderr.is_intercepted());

    let started = Instant::now();
    forwarder.stop().await.unwrap();
    forwarder.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(forwarder.state(), PipelineState::Stopped);
    assert!(!stdout.is_intercepted() && !stderr.is_intercepted());

    writeln!(stdout, "after stop").unwrap();
    assert_eq!(out.text(), "after stop\n");
    assert_eq!(read_log(dir.path()), "");
}

#[tokio::test]
async fn disabled_forwarder_leaves_streams_alone() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(dir.path());
    config.forwarder.enabled = false;

    let (stdout, _, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(config).with_stream(stdout.clone());
    forwarder.start().await.unwrap();

    assert_eq!(forwarder.state(), PipelineState::Stopped);
    assert!(!stdout.is_intercepted());
    assert!(!dir.path().join("app.log").exists());
}

#[tokio::test]
async fn missing_config_file_fails_start() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(FileConfigSource::new(dir.path().join("absent.toml")))
        .with_stream(stdout.clone());

    assert!(forwarder.start().await.is_err());
    assert_eq!(forwarder.state(), PipelineState::Stopped);
    assert!(!stdout.is_intercepted());
}

#[tokio::test]
async fn reload_applies_new_configuration() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("logtap.toml");
    let log_dir = dir.path().join("logs");
    let write_config = |min: &str| {
        let mut config = base_config(&log_dir);
        config.forwarder.min_severity_level = min.to_owned();
        std::fs::write(&config_path, config.to_toml_string().unwrap()).unwrap();
    };

    write_config("DEBUG");
    let (mut stdout, _, _, _) = host_streams();
    let handle = ForwarderHandle::new(
        LogForwarder::new(FileConfigSource::new(&config_path)).with_stream(stdout.clone()),
    );
    handle.start().await.unwrap();
    writeln!(stdout, "first info").unwrap();

    write_config("ERROR");
    handle.reload().await.unwrap();
    assert_eq!(handle.state().await, PipelineState::Running);
    assert!(stdout.is_intercepted());

    writeln!(stdout, "second info").unwrap();
    writeln!(stdout, "ERROR second").unwrap();
    handle.stop().await.unwrap();

    assert_eq!(
        read_log(&log_dir),
        "INFO stdout first info\nERROR stdout ERROR second\n"
    );
}

#[tokio::test]
async fn unreachable_syslog_does_not_stall_forwarding() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(dir.path());
    config.forwarder.syslog_enabled = true;
    config.forwarder.syslog_host = "192.0.2.1".to_owned();
    config.forwarder.syslog_timeout_ms = 50;

    let (mut stdout, out, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(config).with_stream(stdout.clone());
    forwarder.start().await.unwrap();

    let started = Instant::now();
    for i in 0..100 {
        writeln!(stdout, "message {i}").unwrap();
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(out.text().lines().count(), 100);

    // Worst case: one timeout per message plus the shutdown bound.
    tokio::time::timeout(Duration::from_secs(10), forwarder.stop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(forwarder.state(), PipelineState::Stopped);
    assert!(read_log(dir.path()).lines().count() >= 1);
}

#[tokio::test]
async fn unwritable_log_directory_still_starts() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = base_config(&blocker.join("logs"));
    let (mut stdout, out, _, _) = host_streams();
    let mut forwarder = LogForwarder::new(config).with_stream(stdout.clone());

    forwarder.start().await.unwrap();
    assert_eq!(forwarder.state(), PipelineState::Running);
    assert!(forwarder.sinks().is_empty());

    writeln!(stdout, "still mirrored").unwrap();
    forwarder.stop().await.unwrap();
    assert_eq!(out.text(), "still mirrored\n");
}

#[tokio::test]
async fn unusable_file_values_fall_back_instead_of_failing_start() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("logtap.toml");
    let log_dir = dir.path().join("logs");
    std::fs::write(
        &config_path,
        format!(
            r#"
[general]
log_level = "warning"

[forwarder]
buffer_capacity = 0
poll_interval_ms = 0
shutdown_timeout_ms = 0
log_directory = {:?}
log_filename_pattern = "app.log"
file_log_format = "{{level}} {{stream}} {{message}}"
"#,
            log_dir.display().to_string()
        ),
    )
    .unwrap();

    let (mut stdout, _, _, _) = host_streams();
    let mut forwarder =
        LogForwarder::new(FileConfigSource::new(&config_path)).with_stream(stdout.clone());
    forwarder.start().await.unwrap();

    assert_eq!(forwarder.state(), PipelineState::Running);
    assert!(stdout.is_intercepted());
    let settings = forwarder.settings().unwrap();
    assert_eq!(settings.buffer_capacity, 10_000);
    assert_eq!(settings.poll_interval, Duration::from_millis(100));
    assert_eq!(settings.shutdown_timeout, Duration::from_millis(2000));

    writeln!(stdout, "ERROR still forwarded").unwrap();
    forwarder.stop().await.unwrap();
    assert_eq!(read_log(&log_dir), "ERROR stdout ERROR still forwarded\n");
}
