//! Lifecycle trait implemented by forwarding pipelines.
//!
//! # Lifecycle
//! ```text
//! Stopped → start() → Starting → Running → stop() → Stopping → Stopped
//! ```
//!
//! `reload()` is `stop()` followed by `start()` and is legal from either
//! `Running` or `Stopped`. Calling `start()` while running or `stop()` while
//! stopped is a no-op, not an error.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::LogtapError;

/// Boxed future used by dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health reported by [`Pipeline::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Still forwarding, but something needs attention.
    Degraded(String),
    /// Not forwarding at all.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// Start/stop/reload entry points exposed to the host.
///
/// Each method returns only after its side effects are complete: sinks are
/// open (or closed) and interception is installed (or removed). The worker
/// itself keeps running in the background between `start` and `stop`.
pub trait Pipeline: Send {
    fn start(&mut self) -> impl Future<Output = Result<(), LogtapError>> + Send;

    fn stop(&mut self) -> impl Future<Output = Result<(), LogtapError>> + Send;

    /// Stops, re-reads configuration, and starts again.
    fn reload(&mut self) -> impl Future<Output = Result<(), LogtapError>> + Send;

    fn state(&self) -> PipelineState;

    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
