// redactkit-core/src/patterns/mod.rs
//! Compiled PII patterns.
//!
//! A [`Pattern`] is the engine-facing form of a catalogue rule: a compiled regex plus the
//! priority, placeholder template, severity and optional semantic validator that drive
//! detection. Patterns are immutable once built; the engine borrows them for each call.

pub mod compiler;

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

use crate::config::Severity;
use crate::errors::RedactError;
use compiler::{validate_pattern_source, validate_placeholder_template, REGEX_SIZE_LIMIT};

/// A semantic check applied to a regex match before it is accepted.
///
/// Receives the matched value and its surrounding context window. Returning `false`
/// silently drops the candidate.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &str, context: &str) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn validate(&self, value: &str, context: &str) -> bool {
        self(value, context)
    }
}

#[derive(Clone)]
pub struct Pattern {
    /// Type identifier reported on every detection (e.g. "EMAIL").
    pub pattern_type: String,
    pub regex: Regex,
    /// Higher values are checked first.
    pub priority: i32,
    /// Template with a `{n}` slot for the placeholder id.
    pub placeholder_template: String,
    pub severity: Severity,
    pub validator: Option<Arc<dyn Validator>>,
    /// Overrides the engine-wide `regex_timeout_ms` for this pattern.
    pub timeout_ms: Option<u64>,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("pattern_type", &self.pattern_type)
            .field("regex", &self.regex.as_str())
            .field("priority", &self.priority)
            .field("placeholder_template", &self.placeholder_template)
            .field("severity", &self.severity)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Pattern {
    /// Validates and compiles a pattern. Malformed or oversized sources are rejected here,
    /// before any text is scanned.
    pub fn new(
        pattern_type: &str,
        source: &str,
        priority: i32,
        placeholder_template: &str,
        severity: Severity,
    ) -> Result<Self, RedactError> {
        validate_pattern_source(pattern_type, source)?;
        validate_placeholder_template(pattern_type, placeholder_template)?;
        let regex = RegexBuilder::new(source)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| RedactError::invalid_pattern(pattern_type, e.to_string()))?;
        Ok(Self::from_regex(pattern_type, regex, priority, placeholder_template, severity))
    }

    pub(crate) fn from_regex(
        pattern_type: &str,
        regex: Regex,
        priority: i32,
        placeholder_template: &str,
        severity: Severity,
    ) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            regex,
            priority,
            placeholder_template: placeholder_template.to_string(),
            severity,
            validator: None,
            timeout_ms: None,
        }
    }

    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Returns a copy with an adjusted priority; used by priority optimizers.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// True when the regex has at least one capturing group, whose first group is the
    /// reported value.
    pub fn has_capture_group(&self) -> bool {
        self.regex.captures_len() > 1
    }

    pub(crate) fn accepts(&self, value: &str, context: &str) -> bool {
        self.validator.as_ref().map_or(true, |v| v.validate(value, context))
    }
}

/// Type-id fragments that mark a pattern as credential-like.
pub const CREDENTIAL_TYPE_FRAGMENTS: [&str; 9] = [
    "API_KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "PRIVATE_KEY", "AWS", "GITHUB", "JWT",
];

/// True when `pattern_type` names a credential-like type (API keys, tokens, passwords, ...).
pub fn is_credential_type(pattern_type: &str) -> bool {
    let upper = pattern_type.to_uppercase();
    CREDENTIAL_TYPE_FRAGMENTS.iter().any(|f| upper.contains(f))
}

/// Sorts patterns by priority, highest first. Equal priorities keep their input order.
pub fn sort_by_priority(patterns: &mut [Pattern]) {
    patterns.sort_by(|a, b| b.priority.cmp(&a.priority));
}
