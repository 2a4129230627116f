//! Sink abstraction and the best-effort sink set.
//!
//! [`Sink`] uses RPITIT and is therefore not dyn-compatible; [`DynSink`] is
//! the boxed-future mirror with a blanket impl, so heterogeneous sinks can
//! live in one `Vec<Box<dyn DynSink>>`.
//!
//! [`SinkSet`] is the error boundary: a failed `emit` is counted on that
//! sink's [`SinkStats`] and dropped. It never stops delivery to the other
//! sinks and is never reported through `tracing`, since the agent's own
//! diagnostics may be captured by the very pipeline that failed.

pub mod file;
pub mod syslog;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tracing::debug;

use logtap_core::metrics as names;
use logtap_core::pipeline::BoxFuture;
use logtap_core::types::LogRecord;

use crate::error::ForwarderError;

pub use file::RotatingFileSink;
pub use syslog::{Facility, SyslogSink};

/// A destination for accepted records.
pub trait Sink: Send {
    /// Short kind name used as the metrics label (`file`, `syslog`).
    fn name(&self) -> &str;

    /// Where records go: a path or `host:port`.
    fn target(&self) -> String;

    /// Delivers one record. Called sequentially by the dispatcher.
    fn emit(
        &mut self,
        record: &LogRecord,
    ) -> impl Future<Output = Result<(), ForwarderError>> + Send;

    /// Flushes and releases the underlying resource.
    fn close(&mut self) -> impl Future<Output = Result<(), ForwarderError>> + Send;
}

/// dyn-compatible form of [`Sink`].
pub trait DynSink: Send {
    fn name(&self) -> &str;

    fn target(&self) -> String;

    fn emit<'a>(&'a mut self, record: &'a LogRecord) -> BoxFuture<'a, Result<(), ForwarderError>>;

    fn close(&mut self) -> BoxFuture<'_, Result<(), ForwarderError>>;
}

impl<T: Sink> DynSink for T {
    fn name(&self) -> &str {
        Sink::name(self)
    }

    fn target(&self) -> String {
        Sink::target(self)
    }

    fn emit<'a>(&'a mut self, record: &'a LogRecord) -> BoxFuture<'a, Result<(), ForwarderError>> {
        Box::pin(Sink::emit(self, record))
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ForwarderError>> {
        Box::pin(Sink::close(self))
    }
}

/// Delivery counters of one sink.
#[derive(Debug, Default)]
pub struct SinkStats {
    emitted: AtomicU64,
    failed: AtomicU64,
    last_failed: AtomicBool,
}

impl SinkStats {
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// `true` if the most recent delivery attempt failed.
    pub fn last_failed(&self) -> bool {
        self.last_failed.load(Ordering::Relaxed)
    }

    fn record_success(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        self.last_failed.store(false, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.last_failed.store(true, Ordering::Relaxed);
    }
}

/// Point-in-time view of a sink for status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkSnapshot {
    pub name: String,
    pub target: String,
    pub emitted: u64,
    pub failed: u64,
    pub last_failed: bool,
}

/// A sink's identity plus a live handle to its counters.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    name: String,
    target: String,
    stats: Arc<SinkStats>,
}

impl SinkHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            name: self.name.clone(),
            target: self.target.clone(),
            emitted: self.stats.emitted(),
            failed: self.stats.failed(),
            last_failed: self.stats.last_failed(),
        }
    }
}

struct SinkEntry {
    sink: Box<dyn DynSink>,
    handle: SinkHandle,
}

/// The enabled sinks of one session.
#[derive(Default)]
pub struct SinkSet {
    entries: Vec<SinkEntry>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink and returns a handle to its counters.
    pub fn push(&mut self, sink: Box<dyn DynSink>) -> SinkHandle {
        let handle = SinkHandle {
            name: sink.name().to_owned(),
            target: sink.target(),
            stats: Arc::new(SinkStats::default()),
        };
        self.entries.push(SinkEntry {
            sink,
            handle: handle.clone(),
        });
        handle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> Vec<SinkHandle> {
        self.entries.iter().map(|e| e.handle.clone()).collect()
    }

    /// Offers a record to every sink in order. Returns how many accepted it.
    pub async fn emit_all(&mut self, record: &LogRecord) -> usize {
        let mut delivered = 0;
        for entry in &mut self.entries {
            match entry.sink.emit(record).await {
                Ok(()) => {
                    entry.handle.stats.record_success();
                    delivered += 1;
                }
                Err(_) => {
                    entry.handle.stats.record_failure();
                    metrics::counter!(
                        names::SINK_ERRORS_TOTAL,
                        names::LABEL_SINK => entry.handle.name.clone()
                    )
                    .increment(1);
                }
            }
        }
        delivered
    }

    /// Closes and removes every sink. A second call finds nothing to close.
    pub async fn close_all(&mut self) {
        for mut entry in std::mem::take(&mut self.entries) {
            if let Err(e) = entry.sink.close().await {
                debug!(sink = %entry.handle.name, error = %e, "sink close failed");
            }
        }
    }
}
