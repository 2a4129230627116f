#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logtap_forwarder::ExclusionFilter;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    wildcards: Vec<String>,
    patterns: Vec<String>,
    regexes: Vec<String>,
    message: String,
}

fuzz_target!(|input: FuzzInput| {
    // Bound compile cost per iteration.
    if input.wildcards.len() + input.patterns.len() + input.regexes.len() > 16 {
        return;
    }

    // Malformed rules are rejected, never a panic.
    let (filter, _rejected) =
        ExclusionFilter::build(&input.wildcards, &input.patterns, &input.regexes);
    let _ = filter.is_excluded(&input.message);

    // A literal substring rule always matches its own (trimmed) text.
    let trimmed = input.message.trim();
    if !trimmed.is_empty() {
        let (literal, rejected) = ExclusionFilter::build(&[], &[trimmed.to_owned()], &[]);
        assert!(rejected.is_empty());
        assert!(literal.is_excluded(&input.message));
    }
});
