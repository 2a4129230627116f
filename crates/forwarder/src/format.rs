//! Line templates for sink output.
//!
//! Tokens: `{timestamp}`, `{level}`, `{message}`, `{pid}`, `{stream}`.
//! Anything else, including unknown `{tokens}` and stray braces, is copied
//! verbatim. Templates are parsed once when a sink is built.

use std::fmt::Write as _;

use logtap_core::types::LogRecord;

/// Timestamp layout used for `{timestamp}`, e.g. `2026-02-07 14:03:21,118`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp,
    Level,
    Message,
    Pid,
    Stream,
}

/// A parsed line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormat {
    segments: Vec<Segment>,
    pid: u32,
}

impl MessageFormat {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let token = after.find('}').and_then(|close| {
                let segment = match &after[..close] {
                    "timestamp" => Segment::Timestamp,
                    "level" => Segment::Level,
                    "message" => Segment::Message,
                    "pid" => Segment::Pid,
                    "stream" => Segment::Stream,
                    _ => return None,
                };
                Some((segment, close))
            });
            match token {
                Some((segment, close)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                    rest = &after[close + 1..];
                }
                None => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            segments,
            pid: std::process::id(),
        }
    }

    /// Renders one record. The result carries no trailing newline.
    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(record.message.len() + 48);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Timestamp => {
                    let _ = write!(out, "{}", record.timestamp.format(TIMESTAMP_FORMAT));
                }
                Segment::Level => out.push_str(record.severity.as_str()),
                Segment::Message => out.push_str(&record.message),
                Segment::Pid => {
                    let _ = write!(out, "{}", self.pid);
                }
                Segment::Stream => out.push_str(record.stream.as_str()),
            }
        }
        out
    }

    /// `true` if the template references `{message}`.
    pub fn has_message(&self) -> bool {
        self.segments.contains(&Segment::Message)
    }
}
