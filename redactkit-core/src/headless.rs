// redactkit-core/src/headless.rs

//! `headless.rs`
//! Convenience wrappers for one-shot use of the engine without managing an instance.
//! Each call builds a fresh engine over the built-in catalogue, so placeholder memos and
//! caches do not carry over between calls.

use crate::config::DetectOptions;
use crate::detection::DetectionResult;
use crate::engine::DetectionEngine;
use crate::engines::pii_engine::PiiEngine;
use crate::errors::RedactError;

/// Detects PII in `text` with the built-in catalogue and returns the full result.
pub fn detect_pii(text: &str, options: DetectOptions) -> Result<DetectionResult, RedactError> {
    let engine: Box<dyn DetectionEngine> = Box::new(PiiEngine::new(options)?);
    engine.detect(text)
}

/// Returns `text` with every detected PII value replaced by its placeholder.
pub fn headless_redact_string(text: &str, options: DetectOptions) -> Result<String, RedactError> {
    Ok(detect_pii(text, options)?.redacted)
}
