// redactkit-core/src/lib.rs
//! # RedactKit Core Library
//!
//! `redactkit-core` finds personally identifiable information (PII) in free text and replaces
//! it with reversible placeholders. Patterns are applied in priority order under a wall-clock
//! budget; each candidate is arbitrated against already-claimed text, validated, optionally
//! screened for false positives, scored for confidence from its surrounding context and
//! checked against a whitelist before it is redacted.
//!
//! The library performs no I/O on the hot path and installs no logger; it reports through the
//! `log` facade.
//!
//! ## Modules
//!
//! * `config`: `PatternRule`/`PatternCatalog` (YAML catalogues) and `DetectOptions`.
//! * `patterns`: compiled `Pattern`s, validators and the compiled-pattern cache.
//! * `validators`: semantic checks (SSN, NINO, Luhn, NHS number, IBAN).
//! * `safe_regex`: bounded regex execution (timeouts and match ceilings).
//! * `overlap`: `Span` arithmetic and overlap arbitration.
//! * `context`: context-aware confidence scoring.
//! * `false_positive`: heuristic false-positive classification.
//! * `matcher` / `multi_pass`: single-pass matching and the banded multi-pass pipeline.
//! * `placeholder`: placeholder generation, redaction and restore.
//! * `cache`: the per-engine LRU result cache.
//! * `sources`: traits for external pattern, priority and whitelist suppliers.
//! * `engine` / `engines`: the `DetectionEngine` trait and the `PiiEngine` implementation.
//! * `profiles`: signed compliance profiles.
//! * `headless`: one-shot helpers.
//!
//! ## Usage Example
//!
//! ```rust
//! use redactkit_core::{DetectOptions, DetectionEngine, PiiEngine};
//!
//! fn main() -> Result<(), redactkit_core::RedactError> {
//!     let engine = PiiEngine::new(DetectOptions::default())?;
//!     let input = "Email john@example.com or call 07700900123";
//!
//!     let result = engine.detect(input)?;
//!     assert_eq!(result.detections.len(), 2);
//!     assert_eq!(engine.restore(&result.redacted, &result.redaction_map), input);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Engine operations return [`RedactError`]. Malformed patterns and invalid options fail when
//! the engine is built. A pattern that exceeds its time budget or match ceiling during
//! `detect()` is skipped and listed in [`DetectionResult::failures`].
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod cache;
pub mod config;
pub mod context;
pub mod detection;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod false_positive;
pub mod headless;
pub mod matcher;
pub mod multi_pass;
pub mod overlap;
pub mod patterns;
pub mod placeholder;
pub mod profiles;
pub mod safe_regex;
pub mod sources;
pub mod validators;

/// Configuration types and catalogue helpers.
pub use config::{merge_catalogs, DetectOptions, PatternCatalog, PatternRule, Severity, MAX_PATTERN_LENGTH};

/// The library error type and per-pattern failure records.
pub use errors::{FailureKind, PatternFailure, RedactError};

/// Compiled patterns and the validator capability.
pub use patterns::compiler::{compile_rules, get_or_compile_catalog, get_or_compile_rules, CompiledPatterns};
pub use patterns::{Pattern, Validator};

/// Detection records and results.
pub use detection::{redact_sensitive, Detection, DetectionResult, DetectionStats, ScanSummary};
pub use overlap::{ProcessedRanges, Span};
pub use placeholder::{restore, RedactionMap};

/// Pipeline stages, usable on their own.
pub use context::{ContextScorer, DocumentType};
pub use false_positive::{FalsePositiveFilter, FalsePositiveReason, FalsePositiveVerdict};
pub use multi_pass::{build_passes, Pass};

/// The engine trait, its implementation and the collaborator seams.
pub use engine::DetectionEngine;
pub use engines::pii_engine::{PiiEngine, PiiEngineBuilder};
pub use sources::{CatalogSource, IdentityOptimizer, PatternSource, PriorityOptimizer, StaticWhitelist, WhitelistSource};

/// Compliance profiles.
pub use profiles::{
    apply_profile, list_available_profiles, load_profile_by_name, profile_candidate_paths, sign_profile,
    ProfileConfig, ProfileRule, ProfileSummary,
};

/// One-shot helpers.
pub use headless::{detect_pii, headless_redact_string};
