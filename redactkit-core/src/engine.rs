// redactkit-core/src/engine.rs
//! Defines the core `DetectionEngine` trait.
//!
//! The trait decouples callers from a particular engine implementation. Every engine finds
//! PII in a text, replaces it with reversible placeholders, and can put the original values
//! back given the redaction map it produced.
//!
//! License: MIT OR APACHE 2.0

use crate::config::DetectOptions;
use crate::detection::{DetectionResult, ScanSummary};
use crate::errors::RedactError;
use crate::placeholder::RedactionMap;

/// A trait that defines the core functionality of a PII detection engine.
pub trait DetectionEngine: Send + Sync {
    /// Finds, scores and redacts PII in `text`.
    ///
    /// Finding nothing is a normal result with an empty detection list. A pattern that
    /// exceeds its time budget or match ceiling is reported in `failures` and skipped, unless
    /// the engine was configured to abort on such failures.
    fn detect(&self, text: &str) -> Result<DetectionResult, RedactError>;

    /// Replaces every placeholder in `redacted` with the value it stands for.
    fn restore(&self, redacted: &str, redaction_map: &RedactionMap) -> String;

    /// Runs `detect` and groups the detections by severity.
    fn scan(&self, text: &str) -> Result<ScanSummary, RedactError> {
        let result = self.detect(text)?;
        Ok(ScanSummary::from_detections(result.detections))
    }

    /// Returns a reference to the engine's options.
    fn options(&self) -> &DetectOptions;

    /// Drops every memoised result. Must be called whenever the active pattern set or
    /// priorities change.
    fn clear_cache(&self);
}
