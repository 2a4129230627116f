//! Background dispatch loop.
//!
//! Every `poll_interval` the dispatcher drains the buffer and, for each
//! message in arrival order: trims it, classifies it, drops it if it is
//! below the minimum severity or matches an exclusion rule, and otherwise
//! offers the resulting [`LogRecord`] to every sink.
//!
//! Dropped messages only move counters. Nothing on the per-message path
//! logs through `tracing`, because the agent's own output may be the very
//! stream being intercepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use logtap_core::metrics as names;
use logtap_core::types::{LogMessage, LogRecord, Severity};

use crate::buffer::MessageBuffer;
use crate::classifier::classify;
use crate::settings::ForwarderSettings;
use crate::sink::SinkSet;

/// Counters shared between the worker and status readers.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    below_severity: AtomicU64,
    excluded: AtomicU64,
    cycles: AtomicU64,
}

impl DispatchStats {
    /// Records accepted and offered to the sinks.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Messages dropped by the severity threshold.
    pub fn below_severity(&self) -> u64 {
        self.below_severity.load(Ordering::Relaxed)
    }

    /// Messages dropped by an exclusion rule.
    pub fn excluded(&self) -> u64 {
        self.excluded.load(Ordering::Relaxed)
    }

    /// Completed drain passes.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched(),
            below_severity: self.below_severity(),
            excluded: self.excluded(),
            cycles: self.cycles(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub dispatched: u64,
    pub below_severity: u64,
    pub excluded: u64,
    pub cycles: u64,
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    BelowSeverity,
    Excluded,
}

/// Drains the buffer into the sinks.
#[derive(Clone)]
pub struct Dispatcher {
    buffer: Arc<MessageBuffer>,
    settings: Arc<ForwarderSettings>,
    sinks: Arc<Mutex<SinkSet>>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(
        buffer: Arc<MessageBuffer>,
        settings: Arc<ForwarderSettings>,
        sinks: Arc<Mutex<SinkSet>>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            buffer,
            settings,
            sinks,
            stats,
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Severity and exclusion decision for a trimmed message.
    pub fn judge(&self, text: &str) -> (Verdict, Severity) {
        let severity = classify(text);
        let verdict = if severity < self.settings.min_severity {
            Verdict::BelowSeverity
        } else if self.settings.filter.is_excluded(text) {
            Verdict::Excluded
        } else {
            Verdict::Accepted
        };
        (verdict, severity)
    }

    /// Processes `messages` in order. Returns how many were accepted.
    pub async fn dispatch_batch(&self, messages: Vec<LogMessage>) -> usize {
        let mut sinks = self.sinks.lock().await;
        let mut accepted = 0;

        for message in messages {
            let text = message.text().trim();
            if text.is_empty() {
                continue;
            }
            let (verdict, severity) = self.judge(text);
            match verdict {
                Verdict::Accepted => {
                    let record = LogRecord::now(severity, message.stream(), text);
                    sinks.emit_all(&record).await;
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(names::MESSAGES_DISPATCHED_TOTAL).increment(1);
                    accepted += 1;
                }
                Verdict::BelowSeverity => {
                    self.stats.below_severity.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(names::MESSAGES_FILTERED_TOTAL, names::LABEL_REASON => names::REASON_SEVERITY)
                        .increment(1);
                }
                Verdict::Excluded => {
                    self.stats.excluded.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(names::MESSAGES_FILTERED_TOTAL, names::LABEL_REASON => names::REASON_EXCLUDED)
                        .increment(1);
                }
            }
        }
        accepted
    }

    /// One drain-and-dispatch pass.
    pub async fn run_once(&self) -> usize {
        let batch = self.buffer.drain_all();
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        if batch.is_empty() {
            return 0;
        }
        trace!(count = batch.len(), "dispatching batch");
        self.dispatch_batch(batch).await
    }

    /// Runs until `cancel` fires, then performs one final pass.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }

        let flushed = self.run_once().await;
        debug!(flushed, "dispatcher finished final pass");
    }
}
