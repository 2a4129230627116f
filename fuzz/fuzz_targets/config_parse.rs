#![no_main]

use libfuzzer_sys::fuzz_target;

use logtap_core::config::LogtapConfig;
use logtap_forwarder::ForwarderSettings;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Whatever parses must also resolve, falling back instead of failing.
    if let Ok(config) = LogtapConfig::parse(text) {
        let _ = ForwarderSettings::resolve(&config.forwarder);
    }
});
