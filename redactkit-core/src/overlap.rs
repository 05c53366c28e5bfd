//! Span arithmetic and overlap arbitration.
//!
//! Patterns run in priority order and every accepted span is recorded in a
//! [`ProcessedRanges`]. A later candidate that overlaps any recorded span is discarded, so
//! higher-priority patterns always keep the text they claimed first.

use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Returns `None` unless `start < end`.
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Overlap test between two half-open spans: the candidate starts inside `other`,
    /// ends inside `other`, or contains it. Touching spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        let start_inside = self.start >= other.start && self.start < other.end;
        let end_inside = self.end > other.start && self.end <= other.end;
        let contains = self.start <= other.start && self.end >= other.end;
        start_inside || end_inside || contains
    }
}

/// Append-only record of spans accepted during one detection run.
#[derive(Debug, Clone, Default)]
pub struct ProcessedRanges {
    spans: Vec<Span>,
}

impl ProcessedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overlaps(&self, candidate: &Span) -> bool {
        self.spans.iter().any(|existing| candidate.overlaps(existing))
    }

    pub fn push(&mut self, span: Span) {
        self.spans.push(span);
    }

    /// Records `span` unless it overlaps an existing one. Returns whether it was recorded.
    pub fn try_claim(&mut self, span: Span) -> bool {
        if self.overlaps(&span) {
            return false;
        }
        self.spans.push(span);
        true
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }
}
