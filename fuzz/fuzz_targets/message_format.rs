#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logtap_core::types::{LogRecord, Severity, StreamKind};
use logtap_forwarder::MessageFormat;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    template: String,
    message: String,
    error_level: bool,
}

fuzz_target!(|input: FuzzInput| {
    let format = MessageFormat::parse(&input.template);
    let severity = if input.error_level {
        Severity::Error
    } else {
        Severity::Info
    };
    let record = LogRecord::now(severity, StreamKind::Stderr, input.message);

    // Unknown or unbalanced braces are kept verbatim, never a panic.
    let _ = format.render(&record);
});
