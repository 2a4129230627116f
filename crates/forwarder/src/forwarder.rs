//! Lifecycle manager.
//!
//! [`LogForwarder`] owns one forwarding session at a time. A session is the
//! set of objects built by `start` from one configuration snapshot and torn
//! down by `stop`:
//!
//! ```text
//! start:  load config → resolve settings → open sinks → install streams → spawn worker
//! stop:   uninstall streams → cancel worker → wait (bounded) → close sinks
//! ```
//!
//! Streams are uninstalled before the worker is cancelled so the worker's
//! final pass sees every message written up to that point.
//!
//! There is no process-wide instance. The host builds a forwarder, attaches
//! the stream handles it writes through, and wraps it in a
//! [`ForwarderHandle`] if several tasks need to drive it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logtap_core::config::ConfigSource;
use logtap_core::error::LogtapError;
use logtap_core::pipeline::{HealthStatus, Pipeline, PipelineState};
use logtap_core::types::Severity;

use crate::buffer::MessageBuffer;
use crate::dispatcher::{DispatchSnapshot, DispatchStats, Dispatcher};
use crate::interceptor::InterceptableStream;
use crate::settings::ForwarderSettings;
use crate::sink::{RotatingFileSink, SinkHandle, SinkSet, SinkSnapshot, SyslogSink};

/// Buffer fill ratio above which health degrades.
const BUFFER_DEGRADED_RATIO: f64 = 0.9;

struct ActiveSession {
    settings: Arc<ForwarderSettings>,
    buffer: Arc<MessageBuffer>,
    sinks: Arc<Mutex<SinkSet>>,
    sink_handles: Vec<SinkHandle>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// Serializable view of a forwarder for `status` output.
#[derive(Debug, Clone, Serialize)]
pub struct ForwarderStatus {
    pub state: PipelineState,
    pub config_source: String,
    /// `None` until configuration has been loaded once.
    pub enabled: Option<bool>,
    pub streams: usize,
    pub intercepted_streams: usize,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    /// Non-blank messages captured over the forwarder's lifetime.
    pub captured: u64,
    /// Messages lost to buffer overflow over the forwarder's lifetime.
    pub evicted: u64,
    /// Threshold of the running session.
    pub min_severity: Option<Severity>,
    pub dispatch: DispatchSnapshot,
    pub sinks: Vec<SinkSnapshot>,
}

/// Captures host output and forwards it to the configured sinks.
pub struct LogForwarder<S: ConfigSource> {
    source: S,
    streams: Vec<InterceptableStream>,
    state: PipelineState,
    session: Option<ActiveSession>,
    /// `enabled` flag of the last loaded configuration.
    enabled: Option<bool>,
    stats: Arc<DispatchStats>,
    /// Counters of finished sessions.
    captured_before: u64,
    evicted_before: u64,
}

impl<S: ConfigSource> LogForwarder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            streams: Vec::new(),
            state: PipelineState::Stopped,
            session: None,
            enabled: None,
            stats: Arc::new(DispatchStats::default()),
            captured_before: 0,
            evicted_before: 0,
        }
    }

    /// Builder form of [`attach`](Self::attach).
    pub fn with_stream(mut self, stream: InterceptableStream) -> Self {
        self.attach(stream);
        self
    }

    /// Adds a stream to intercept. If a session is running it is installed immediately.
    pub fn attach(&mut self, stream: InterceptableStream) {
        if let Some(session) = &self.session {
            stream.install(Arc::clone(&session.buffer));
        }
        self.streams.push(stream);
    }

    pub fn streams(&self) -> &[InterceptableStream] {
        &self.streams
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Settings of the running session.
    pub fn settings(&self) -> Option<Arc<ForwarderSettings>> {
        self.session.as_ref().map(|s| Arc::clone(&s.settings))
    }

    /// Sink handles of the running session.
    pub fn sinks(&self) -> &[SinkHandle] {
        match &self.session {
            Some(session) => &session.sink_handles,
            None => &[],
        }
    }

    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    pub fn status(&self) -> ForwarderStatus {
        let (buffer_len, buffer_capacity, captured, evicted) = match &self.session {
            Some(s) => (
                s.buffer.len(),
                s.buffer.capacity(),
                s.buffer.total_received(),
                s.buffer.evicted_count(),
            ),
            None => (0, 0, 0, 0),
        };
        ForwarderStatus {
            state: self.state,
            config_source: self.source.describe(),
            enabled: self.enabled,
            streams: self.streams.len(),
            intercepted_streams: self.streams.iter().filter(|s| s.is_intercepted()).count(),
            buffer_len,
            buffer_capacity,
            captured: self.captured_before + captured,
            evicted: self.evicted_before + evicted,
            min_severity: self.settings().map(|s| s.min_severity),
            dispatch: self.stats.snapshot(),
            sinks: self.sinks().iter().map(SinkHandle::snapshot).collect(),
        }
    }

    async fn open_sinks(settings: &ForwarderSettings) -> SinkSet {
        let mut set = SinkSet::new();

        if let Some(file) = &settings.file {
            match RotatingFileSink::open(file).await {
                Ok(sink) => {
                    debug!(path = %sink.path().display(), "file sink opened");
                    set.push(Box::new(sink));
                }
                Err(e) => warn!(error = %e, "file sink unavailable for this session"),
            }
        }

        if let Some(syslog) = &settings.syslog {
            debug!(collector = %syslog.target(), facility = %syslog.facility, "syslog sink configured");
            set.push(Box::new(SyslogSink::new(syslog.clone())));
        }

        set
    }
}

impl<S: ConfigSource> Pipeline for LogForwarder<S> {
    async fn start(&mut self) -> Result<(), LogtapError> {
        if self.state != PipelineState::Stopped {
            debug!(state = %self.state, "start ignored");
            return Ok(());
        }
        self.state = PipelineState::Starting;

        let config = match self.source.load().await {
            Ok(config) => config,
            Err(e) => {
                self.state = PipelineState::Stopped;
                return Err(e);
            }
        };
        let settings = ForwarderSettings::from_config(&config.forwarder);
        self.enabled = Some(settings.enabled);
        if !settings.enabled {
            info!(source = %self.source.describe(), "log forwarder disabled by configuration");
            self.state = PipelineState::Stopped;
            return Ok(());
        }

        let settings = Arc::new(settings);
        let sinks = Self::open_sinks(&settings).await;
        let sink_handles = sinks.handles();
        if !settings.has_sinks() {
            warn!("no sink enabled, captured output will be discarded");
        } else if sink_handles.is_empty() {
            warn!("no sink could be opened, captured output will be discarded");
        }

        let buffer = Arc::new(MessageBuffer::new(settings.buffer_capacity));
        for stream in &self.streams {
            stream.install(Arc::clone(&buffer));
        }

        let sinks = Arc::new(Mutex::new(sinks));
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&buffer),
            Arc::clone(&settings),
            Arc::clone(&sinks),
            Arc::clone(&self.stats),
        );
        let worker = tokio::spawn(dispatcher.run(cancel.clone()));

        info!(
            sinks = sink_handles.len(),
            streams = self.streams.len(),
            min_severity = %settings.min_severity,
            exclusion_rules = settings.filter.rule_count(),
            "log forwarder started"
        );

        self.session = Some(ActiveSession {
            settings,
            buffer,
            sinks,
            sink_handles,
            cancel,
            worker,
        });
        self.state = PipelineState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogtapError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.state = PipelineState::Stopping;

        for stream in &self.streams {
            stream.uninstall();
        }

        let ActiveSession {
            settings,
            buffer,
            sinks,
            cancel,
            mut worker,
            ..
        } = session;
        cancel.cancel();

        match tokio::time::timeout(settings.shutdown_timeout, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "dispatcher task failed"),
            Err(_) => {
                warn!(
                    timeout_ms = settings.shutdown_timeout.as_millis() as u64,
                    "dispatcher did not finish in time, aborting"
                );
                worker.abort();
                let _ = worker.await;
            }
        }

        sinks.lock().await.close_all().await;

        self.captured_before += buffer.total_received();
        self.evicted_before += buffer.evicted_count();
        self.state = PipelineState::Stopped;
        info!(
            dispatched = self.stats.dispatched(),
            evicted = self.evicted_before,
            "log forwarder stopped"
        );
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), LogtapError> {
        info!(source = %self.source.describe(), "reloading log forwarder");
        self.stop().await?;
        self.start().await
    }

    fn state(&self) -> PipelineState {
        self.state
    }

    async fn health_check(&self) -> HealthStatus {
        let Some(session) = &self.session else {
            return match self.enabled {
                Some(false) => HealthStatus::Healthy,
                _ => HealthStatus::Unhealthy("stopped".to_owned()),
            };
        };

        let utilization = session.buffer.utilization();
        if utilization > BUFFER_DEGRADED_RATIO {
            return HealthStatus::Degraded(format!(
                "buffer utilization high: {:.1}%",
                utilization * 100.0
            ));
        }
        if let Some(failing) = session
            .sink_handles
            .iter()
            .find(|h| h.stats().last_failed())
        {
            return HealthStatus::Degraded(format!("sink {} is failing", failing.name()));
        }
        HealthStatus::Healthy
    }
}

impl<S: ConfigSource> Drop for LogForwarder<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            for stream in &self.streams {
                stream.uninstall();
            }
            session.cancel.cancel();
            session.worker.abort();
        }
    }
}

/// Shared handle that serializes lifecycle calls from several tasks.
pub struct ForwarderHandle<S: ConfigSource> {
    inner: Arc<Mutex<LogForwarder<S>>>,
}

impl<S: ConfigSource> Clone for ForwarderHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ConfigSource> ForwarderHandle<S> {
    pub fn new(forwarder: LogForwarder<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(forwarder)),
        }
    }

    pub async fn start(&self) -> Result<(), LogtapError> {
        self.inner.lock().await.start().await
    }

    pub async fn stop(&self) -> Result<(), LogtapError> {
        self.inner.lock().await.stop().await
    }

    pub async fn reload(&self) -> Result<(), LogtapError> {
        self.inner.lock().await.reload().await
    }

    pub async fn state(&self) -> PipelineState {
        self.inner.lock().await.state()
    }

    pub async fn status(&self) -> ForwarderStatus {
        self.inner.lock().await.status()
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.inner.lock().await.health_check().await
    }

    pub async fn attach(&self, stream: InterceptableStream) {
        self.inner.lock().await.attach(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::testing::SharedWriter;
    use logtap_core::config::LogtapConfig;
    use logtap_core::types::StreamKind;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> LogtapConfig {
        let mut config = LogtapConfig::default();
        config.forwarder.log_directory = dir.path().display().to_string();
        config.forwarder.log_filename_pattern = "test.log".to_owned();
        config.forwarder.poll_interval_ms = 10;
        config
    }

    fn stream() -> (InterceptableStream, SharedWriter) {
        let out = SharedWriter::default();
        (InterceptableStream::new(StreamKind::Stdout, out.clone()), out)
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() {
        let dir = TempDir::new().unwrap();
        let (stream, _) = stream();
        let mut forwarder = LogForwarder::new(config(&dir)).with_stream(stream.clone());

        forwarder.start().await.unwrap();
        assert_eq!(forwarder.state(), PipelineState::Running);
        assert!(stream.is_intercepted());
        assert_eq!(forwarder.sinks().len(), 1);

        forwarder.stop().await.unwrap();
        assert_eq!(forwarder.state(), PipelineState::Stopped);
        assert!(!stream.is_intercepted());
        assert!(forwarder.sinks().is_empty());
    }

    #[tokio::test]
    async fn start_twice_and_stop_twice_are_no_ops() {
        let dir = TempDir::new().unwrap();
        let mut forwarder = LogForwarder::new(config(&dir));

        forwarder.stop().await.unwrap();
        forwarder.start().await.unwrap();
        forwarder.start().await.unwrap();
        assert_eq!(forwarder.state(), PipelineState::Running);
        forwarder.stop().await.unwrap();
        forwarder.stop().await.unwrap();
        assert_eq!(forwarder.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn disabled_config_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.forwarder.enabled = false;
        let (stream, _) = stream();
        let mut forwarder = LogForwarder::new(cfg).with_stream(stream.clone());

        forwarder.start().await.unwrap();
        assert_eq!(forwarder.state(), PipelineState::Stopped);
        assert!(!stream.is_intercepted());
        assert!(!dir.path().join("test.log").exists());
        assert!(forwarder.health_check().await.is_healthy());
    }

    #[tokio::test]
    async fn stop_flushes_messages_written_before_it() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.forwarder.poll_interval_ms = 60_000;
        cfg.forwarder.file_log_format = "{level}|{message}".to_owned();
        let (mut stream, out) = stream();
        let mut forwarder = LogForwarder::new(cfg).with_stream(stream.clone());

        forwarder.start().await.unwrap();
        writeln!(stream, "WARNING: low disk").unwrap();
        forwarder.stop().await.unwrap();

        assert_eq!(out.contents(), "WARNING: low disk\n");
        let written = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(written, "WARNING|WARNING: low disk\n");
        assert_eq!(forwarder.status().dispatch.dispatched, 1);
    }

    #[tokio::test]
    async fn attach_while_running_installs_immediately() {
        let dir = TempDir::new().unwrap();
        let mut forwarder = LogForwarder::new(config(&dir));
        forwarder.start().await.unwrap();

        let (stream, _) = stream();
        forwarder.attach(stream.clone());
        assert!(stream.is_intercepted());

        drop(forwarder);
        assert!(!stream.is_intercepted());
    }

    #[tokio::test]
    async fn health_reflects_state() {
        let dir = TempDir::new().unwrap();
        let mut forwarder = LogForwarder::new(config(&dir));
        assert!(matches!(
            forwarder.health_check().await,
            HealthStatus::Unhealthy(_)
        ));

        forwarder.start().await.unwrap();
        assert_eq!(forwarder.health_check().await, HealthStatus::Healthy);
        forwarder.stop().await.unwrap();
        assert!(matches!(
            forwarder.health_check().await,
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn status_reports_session_details() {
        let dir = TempDir::new().unwrap();
        let (mut stream, _) = stream();
        let mut forwarder = LogForwarder::new(config(&dir)).with_stream(stream.clone());
        forwarder.start().await.unwrap();
        writeln!(stream, "hello").unwrap();

        let status = forwarder.status();
        assert_eq!(status.state, PipelineState::Running);
        assert_eq!(status.enabled, Some(true));
        assert_eq!(status.config_source, "in-memory");
        assert_eq!(status.intercepted_streams, 1);
        assert_eq!(status.buffer_capacity, 10_000);
        assert_eq!(status.captured, 1);
        assert_eq!(status.sinks[0].name, "file");
        assert_eq!(status.min_severity, Some(Severity::Debug));

        forwarder.stop().await.unwrap();
        let status = forwarder.status();
        assert_eq!(status.captured, 1);
        assert_eq!(status.min_severity, None);
        assert_eq!(status.buffer_capacity, 0);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "stopped");
    }

    #[tokio::test]
    async fn handle_serializes_concurrent_reloads() {
        let dir = TempDir::new().unwrap();
        let (stream, _) = stream();
        let handle = ForwarderHandle::new(LogForwarder::new(config(&dir)).with_stream(stream.clone()));
        handle.start().await.unwrap();

        let a = tokio::spawn({
            let handle = handle.clone();
            async move { handle.reload().await }
        });
        let b = tokio::spawn({
            let handle = handle.clone();
            async move { handle.reload().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(handle.state().await, PipelineState::Running);
        assert!(stream.is_intercepted());
        assert_eq!(handle.status().await.sinks.len(), 1);

        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .unwrap()
            .unwrap();
        assert!(!stream.is_intercepted());
    }
}
