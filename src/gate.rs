//! Quality gate.
//!
//! Two independent checkpoints guard the knowledge base:
//!
//! | Checkpoint | When | Function |
//! |------------|------|----------|
//! | A | after discovery, before any per-entity request | [`filter_candidate_entities`] |
//! | B | after extraction, before writing | [`accept`] |
//!
//! Checkpoint A is a trust boundary: names the discovery step returned are
//! cleaned up but not re-verified against the document. Checkpoint B never
//! lets an `InsufficientInformation` result (or a body still carrying the
//! wire-level marker) reach the writer.

use std::collections::HashSet;
use std::fmt;

use crate::models::{ClientProfile, ExtractionResult};

/// Marker the backend returns when a document says too little about an entity.
pub const SENTINEL: &str = "INSUFFICIENT_INFORMATION";

const PLACEHOLDER_NAMES: [&str; 5] = ["none", "null", "unknown", "n/a", "-"];

/// Why Checkpoint B discarded a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InsufficientInformation,
    EmptyContent,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientInformation => f.write_str("insufficient information"),
            RejectReason::EmptyContent => f.write_str("empty content"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Bodies the gate can inspect.
pub trait GateContent {
    /// Concatenated text the sentinel and emptiness checks look at.
    fn gate_text(&self) -> String;
}

impl GateContent for String {
    fn gate_text(&self) -> String {
        self.clone()
    }
}

impl GateContent for ClientProfile {
    fn gate_text(&self) -> String {
        self.topics
            .iter()
            .map(|(_, topic)| topic.to_markdown())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Checkpoint B.
pub fn accept<T: GateContent>(result: &ExtractionResult<T>) -> Verdict {
    match result {
        ExtractionResult::InsufficientInformation => {
            Verdict::Reject(RejectReason::InsufficientInformation)
        }
        ExtractionResult::Content(body) => {
            let text = body.gate_text();
            if text.contains(SENTINEL) {
                Verdict::Reject(RejectReason::InsufficientInformation)
            } else if text.trim().is_empty() {
                Verdict::Reject(RejectReason::EmptyContent)
            } else {
                Verdict::Accept
            }
        }
    }
}

/// Whether a discovered name is a placeholder rather than a real entity.
pub fn is_placeholder(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    lowered.is_empty() || PLACEHOLDER_NAMES.contains(&lowered.as_str()) || name.contains(SENTINEL)
}

/// Checkpoint A: clean up the entity names discovery returned.
///
/// Order is preserved; the first spelling of a case-insensitive duplicate
/// wins, and names matching an entity in `known` adopt its spelling.
pub fn filter_candidate_entities(raw: &[String], known: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    for name in raw {
        let trimmed = name.trim();
        if is_placeholder(trimmed) {
            continue;
        }
        let canonical = known
            .iter()
            .find(|k| k.to_lowercase() == trimmed.to_lowercase())
            .map(|k| k.as_str())
            .unwrap_or(trimmed);
        if seen.insert(canonical.to_lowercase()) {
            accepted.push(canonical.to_string());
        }
    }
    accepted
}
