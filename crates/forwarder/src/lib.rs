#![doc = include_str!("../README.md")]
//!
//! # Modules
//!
//! - [`buffer`]: bounded drop-oldest queue between producers and the worker
//! - [`interceptor`]: stream handles that mirror writes into the buffer
//! - [`classifier`]: keyword-based severity heuristic
//! - [`filter`]: wildcard, substring, and regex exclusion rules
//! - [`format`]: line templates for sink output
//! - [`sink`]: rotating file and syslog UDP sinks behind one trait
//! - [`dispatcher`]: periodic drain, classify, filter, emit loop
//! - [`forwarder`]: start/stop/reload lifecycle ([`Pipeline`](logtap_core::Pipeline) impl)
//! - [`settings`]: lenient resolution of configuration into runtime settings
//!
//! # Architecture
//!
//! ```text
//! host writes -> InterceptableStream -> MessageBuffer -> Dispatcher -> SinkSet
//!                  (mirror + capture)     (drop-oldest)   (classify,     |
//!                                                          filter)   file / syslog
//! ```

pub mod buffer;
pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod format;
pub mod forwarder;
pub mod interceptor;
pub mod settings;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

// Lifecycle
pub use forwarder::{ForwarderHandle, ForwarderStatus, LogForwarder};

// Capture
pub use buffer::{MessageBuffer, PushOutcome};
pub use interceptor::{InterceptableStream, StreamInterceptor};

// Processing
pub use classifier::classify;
pub use dispatcher::{DispatchSnapshot, Dispatcher};
pub use filter::ExclusionFilter;
pub use format::MessageFormat;
pub use settings::{ConfigWarning, ForwarderSettings};

// Sinks
pub use sink::{DynSink, Facility, RotatingFileSink, Sink, SinkSet, SyslogSink};

pub use error::ForwarderError;
