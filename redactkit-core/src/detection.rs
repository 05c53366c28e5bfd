// redactkit-core/src/detection.rs
//! Detection records, run results, and PII-safe debug logging helpers.

use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Severity;
use crate::errors::PatternFailure;
use crate::overlap::Span;
use crate::placeholder::RedactionMap;

lazy_static! {
    /// Whether detected values may appear verbatim in debug logs.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("REDACTKIT_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// One accepted piece of PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub pattern_type: String,
    pub value: String,
    pub placeholder: String,
    pub span: Span,
    pub severity: Severity,
    /// Heuristic likelihood in `[0, 1]` that the value is genuine PII.
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub processing_time_ms: f64,
    pub pii_count: usize,
    /// Number of passes run; 1 in single-pass mode.
    pub passes: usize,
}

/// Everything one `detect()` call produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub original: String,
    pub redacted: String,
    /// Detections in ascending text order.
    pub detections: Vec<Detection>,
    pub redaction_map: RedactionMap,
    pub stats: DetectionStats,
    /// Patterns abandoned during this call (timeouts, match ceilings).
    #[serde(default)]
    pub failures: Vec<PatternFailure>,
}

/// Detections grouped by severity. Critical findings are reported as high.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub high: Vec<Detection>,
    pub medium: Vec<Detection>,
    pub low: Vec<Detection>,
    pub total: usize,
}

impl ScanSummary {
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        let mut summary = ScanSummary {
            total: detections.len(),
            ..Default::default()
        };
        for d in detections {
            match d.severity {
                Severity::Critical | Severity::High => summary.high.push(d),
                Severity::Medium => summary.medium.push(d),
                Severity::Low => summary.low.push(d),
            }
        }
        summary
    }
}

pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    if s.len() <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", s.len())
    }
}

fn get_loggable_content(sensitive_content: &str) -> String {
    if *PII_DEBUG_ALLOWED {
        sensitive_content.to_string()
    } else {
        redact_sensitive(sensitive_content)
    }
}

pub fn log_detection_debug(module_path: &str, detection: &Detection) {
    debug!(
        "{} Accepted detection: Type='{}', Value='{}', Placeholder='{}', Span={}..{}, Confidence={:.2}",
        module_path,
        detection.pattern_type,
        get_loggable_content(&detection.value),
        detection.placeholder,
        detection.span.start,
        detection.span.end,
        detection.confidence
    );
}

pub fn log_rejection_debug(module_path: &str, pattern_type: &str, value: &str, reason: &str) {
    debug!(
        "{} Rejected candidate for '{}' ({}): '{}'",
        module_path,
        pattern_type,
        reason,
        get_loggable_content(value)
    );
}
