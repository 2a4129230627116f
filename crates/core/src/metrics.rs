//! Metric names used with the `metrics` facade.
//!
//! The forwarder only emits through the facade; nothing is recorded unless
//! the host installs a recorder. Call [`describe_all`] once after doing so.
//!
//! # Naming
//!
//! - prefix: `logtap_`
//! - suffix: `_total` for counters, none for gauges

/// Sink label key (`file`, `syslog`).
pub const LABEL_SINK: &str = "sink";

/// Filter reason label key, valued [`REASON_SEVERITY`] or [`REASON_EXCLUDED`].
pub const LABEL_REASON: &str = "reason";

/// Reason value for messages below the severity threshold.
pub const REASON_SEVERITY: &str = "severity";

/// Reason value for messages matched by an exclusion rule.
pub const REASON_EXCLUDED: &str = "excluded";

/// Messages accepted into the buffer (counter).
pub const MESSAGES_CAPTURED_TOTAL: &str = "logtap_messages_captured_total";

/// Messages evicted by drop-oldest overflow (counter).
pub const MESSAGES_EVICTED_TOTAL: &str = "logtap_messages_evicted_total";

/// Messages handed to the sink set (counter).
pub const MESSAGES_DISPATCHED_TOTAL: &str = "logtap_messages_dispatched_total";

/// Messages dropped by the severity threshold or exclusion rules (counter, label: reason).
pub const MESSAGES_FILTERED_TOTAL: &str = "logtap_messages_filtered_total";

/// Failed sink deliveries (counter, label: sink).
pub const SINK_ERRORS_TOTAL: &str = "logtap_sink_errors_total";

/// Messages currently buffered (gauge).
pub const BUFFER_LEN: &str = "logtap_buffer_len";

/// Registers descriptions for every metric above.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        MESSAGES_CAPTURED_TOTAL,
        "Total messages captured from intercepted streams"
    );
    describe_counter!(
        MESSAGES_EVICTED_TOTAL,
        "Total buffered messages evicted to admit newer ones"
    );
    describe_counter!(
        MESSAGES_DISPATCHED_TOTAL,
        "Total messages delivered to the sink set"
    );
    describe_counter!(
        MESSAGES_FILTERED_TOTAL,
        "Total messages dropped by severity threshold or exclusion rules"
    );
    describe_counter!(SINK_ERRORS_TOTAL, "Total failed sink deliveries");
    describe_gauge!(BUFFER_LEN, "Messages waiting in the buffer");
}
