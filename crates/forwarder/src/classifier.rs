//! Keyword-based severity classification.
//!
//! The scan is a case-insensitive substring search, most severe keyword
//! first. It looks at the whole text, not just a leading label, so a line
//! like `opened error.log` classifies as ERROR. That imprecision is accepted:
//! callers that need accuracy should tag their output explicitly.

use logtap_core::types::Severity;

/// Keywords per level, in precedence order.
const KEYWORDS: [(Severity, &[&str]); 4] = [
    (Severity::Critical, &["CRITICAL", "FATAL"]),
    (Severity::Error, &["ERROR", "EXCEPTION", "TRACEBACK"]),
    (Severity::Warning, &["WARNING", "WARN"]),
    (Severity::Debug, &["DEBUG"]),
];

/// Classifies a message. Anything without a keyword is INFO.
pub fn classify(message: &str) -> Severity {
    let upper = message.to_uppercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| upper.contains(word)))
        .map_or(Severity::Info, |(level, _)| *level)
}
