//! Exclusion rules applied after classification.
//!
//! Three independent rule sets, any match excludes the message:
//!
//! - wildcards: shell-glob patterns matched against the whole trimmed text
//!   (`*`, `?`, `[abc]`, `[!abc]`; `*` also crosses newlines)
//! - patterns: plain substrings
//! - regexes: unanchored regular-expression search
//!
//! Rules that fail to compile are skipped and reported back to the caller;
//! they never prevent the rest of the filter from working.

use regex::Regex;

use crate::error::ForwarderError;

/// A rule that could not be compiled.
#[derive(Debug)]
pub struct RejectedRule {
    /// `exclude_wildcards` or `exclude_regex`.
    pub field: &'static str,
    pub rule: String,
    pub error: ForwarderError,
}

/// Compiled exclusion rules. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    wildcards: Vec<Regex>,
    patterns: Vec<String>,
    regexes: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compiles the three rule sets, returning the filter and any rejected rules.
    ///
    /// Empty entries are ignored.
    pub fn build(
        wildcards: &[String],
        patterns: &[String],
        regexes: &[String],
    ) -> (Self, Vec<RejectedRule>) {
        let mut rejected = Vec::new();

        let wildcards = wildcards
            .iter()
            .filter(|rule| !rule.is_empty())
            .filter_map(|rule| match Regex::new(&glob_to_regex(rule)) {
                Ok(re) => Some(re),
                Err(e) => {
                    rejected.push(RejectedRule {
                        field: "exclude_wildcards",
                        rule: rule.clone(),
                        error: e.into(),
                    });
                    None
                }
            })
            .collect();

        let regexes = regexes
            .iter()
            .filter(|rule| !rule.is_empty())
            .filter_map(|rule| match Regex::new(rule) {
                Ok(re) => Some(re),
                Err(e) => {
                    rejected.push(RejectedRule {
                        field: "exclude_regex",
                        rule: rule.clone(),
                        error: e.into(),
                    });
                    None
                }
            })
            .collect();

        let patterns = patterns
            .iter()
            .filter(|rule| !rule.is_empty())
            .cloned()
            .collect();

        (
            Self {
                wildcards,
                patterns,
                regexes,
            },
            rejected,
        )
    }

    /// `true` if any rule matches the trimmed message.
    pub fn is_excluded(&self, message: &str) -> bool {
        let text = message.trim();
        self.wildcards.iter().any(|re| re.is_match(text))
            || self.patterns.iter().any(|p| text.contains(p.as_str()))
            || self.regexes.iter().any(|re| re.is_match(text))
    }

    /// Number of active rules across all three sets.
    pub fn rule_count(&self) -> usize {
        self.wildcards.len() + self.patterns.len() + self.regexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }
}

/// Translates a shell glob into an anchored regular expression.
///
/// An unterminated `[` is taken literally.
pub fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 8);
    out.push_str("(?s)\\A");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Collapse runs of `*`.
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => out.push_str("\\["),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push_str("\\z");
    out
}

/// Index of the `]` closing the class opened at `start`, if any.
///
/// A `]` directly after `[` or `[!` belongs to the class.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

fn push_class(out: &mut String, body: &[char]) {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };
    out.push('[');
    if negated {
        out.push('^');
    }
    for (idx, &c) in body.iter().enumerate() {
        let is_range = c == '-' && idx > 0 && idx + 1 < body.len();
        if is_range {
            out.push('-');
        } else if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out.push(']');
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
