#![no_main]

use logtap_forwarder::classify;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // Any input classifies to some level without panicking, and the
    // result only depends on the text.
    let first = classify(&text);
    assert_eq!(first, classify(&text));
});
