//! errors.rs - Custom error types for the redactkit-core library.
//!
//! Structural failures (a malformed pattern, an invalid option) surface while an engine is
//! being built. Per-pattern runtime failures (a regex blowing its time budget or its match
//! ceiling) are reported from `detect()` without aborting the other patterns.
//!
//! License: MIT OR APACHE 2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// This enum represents all possible error types in the `redactkit-core` library.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RedactError {
    #[error("Pattern '{pattern_type}' exceeded its {timeout_ms}ms budget ({elapsed_ms}ms elapsed)")]
    RegexTimeout {
        pattern_type: String,
        timeout_ms: u64,
        elapsed_ms: u64,
    },

    #[error("Pattern '{pattern_type}' produced more than {max_matches} matches")]
    RegexMaxMatches {
        pattern_type: String,
        max_matches: usize,
    },

    #[error("Invalid pattern '{pattern_type}': {reason}")]
    InvalidPattern { pattern_type: String, reason: String },

    #[error("Value matched by '{0}' failed semantic validation")]
    ValidationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build the context keyword scanner: {0}")]
    ContextInit(String),

    #[error("An unexpected I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),
}

impl RedactError {
    pub(crate) fn invalid_pattern(pattern_type: &str, reason: impl Into<String>) -> Self {
        RedactError::InvalidPattern {
            pattern_type: pattern_type.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures confined to one pattern's execution during a single call.
    pub fn is_pattern_runtime(&self) -> bool {
        matches!(
            self,
            RedactError::RegexTimeout { .. } | RedactError::RegexMaxMatches { .. }
        )
    }
}

/// The category of a per-pattern runtime failure recorded in a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    MaxMatches,
}

/// A serialisable record of a pattern that was abandoned during one `detect()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFailure {
    pub pattern_type: String,
    pub kind: FailureKind,
    pub message: String,
}

impl PatternFailure {
    /// Converts a runtime error into a failure record. Returns `None` for structural errors.
    pub fn from_error(err: &RedactError) -> Option<Self> {
        let (pattern_type, kind) = match err {
            RedactError::RegexTimeout { pattern_type, .. } => (pattern_type, FailureKind::Timeout),
            RedactError::RegexMaxMatches { pattern_type, .. } => {
                (pattern_type, FailureKind::MaxMatches)
            }
            _ => return None,
        };
        Some(Self {
            pattern_type: pattern_type.clone(),
            kind,
            message: err.to_string(),
        })
    }
}
