//! compiler.rs - Validates, compiles and caches catalogue patterns.
//!
//! Every pattern source passes a cheap syntactic smell test (length cap, stacked
//! quantifiers) before it reaches the regex compiler. Run-time limits live in `safe_regex`.
//!
//! Compiled pattern sets are memoised in a process-wide cache keyed by a hash of the rules,
//! so engines built from the same catalogue share one compilation.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::{debug, warn};
use parking_lot::RwLock;
use regex::RegexBuilder;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tinytemplate::TinyTemplate;

use super::{sort_by_priority, Pattern};
use crate::config::{PatternCatalog, PatternRule, MAX_PATTERN_LENGTH};
use crate::errors::RedactError;
use crate::validators;

/// Upper bound on the compiled size of a single regex.
pub const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// The slot every placeholder template must contain.
pub const PLACEHOLDER_SLOT: &str = "{n}";

/// A priority-sorted set of compiled patterns.
#[derive(Debug)]
pub struct CompiledPatterns {
    pub patterns: Vec<Pattern>,
}

lazy_static! {
    /// Compiled pattern sets keyed by a hash of the rules they were built from.
    static ref COMPILED_PATTERNS_CACHE: RwLock<HashMap<u64, Arc<CompiledPatterns>>> = RwLock::new(HashMap::new());
}

/// Rejects sources that are empty, oversized, or contain stacked quantifiers such as `a*+`.
pub fn validate_pattern_source(pattern_type: &str, source: &str) -> Result<(), RedactError> {
    if source.is_empty() {
        return Err(RedactError::invalid_pattern(pattern_type, "pattern is empty"));
    }
    if source.len() > MAX_PATTERN_LENGTH {
        return Err(RedactError::invalid_pattern(
            pattern_type,
            format!("pattern length ({}) exceeds maximum allowed ({})", source.len(), MAX_PATTERN_LENGTH),
        ));
    }
    if has_stacked_quantifier(source) {
        return Err(RedactError::invalid_pattern(pattern_type, "malformed quantifier sequence"));
    }
    Ok(())
}

/// Scans a regex source for a `*` or `+` directly following another quantifier.
/// Escapes and character classes are skipped; a `?` after a quantifier is a lazy modifier.
fn has_stacked_quantifier(source: &str) -> bool {
    let mut escaped = false;
    let mut in_class = false;
    let mut after_quantifier = false;

    for c in source.chars() {
        if escaped {
            escaped = false;
            after_quantifier = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                after_quantifier = false;
            }
            '[' if !in_class => {
                in_class = true;
                after_quantifier = false;
            }
            ']' if in_class => in_class = false,
            _ if in_class => {}
            '*' | '+' => {
                if after_quantifier {
                    return true;
                }
                after_quantifier = true;
            }
            '}' => after_quantifier = true,
            _ => after_quantifier = false,
        }
    }
    false
}

/// Checks that a placeholder template has a `{n}` slot and renders cleanly.
pub fn validate_placeholder_template(pattern_type: &str, template: &str) -> Result<(), RedactError> {
    if !template.contains(PLACEHOLDER_SLOT) {
        return Err(RedactError::invalid_pattern(
            pattern_type,
            format!("placeholder template '{}' has no {} slot", template, PLACEHOLDER_SLOT),
        ));
    }
    let mut tt = TinyTemplate::new();
    tt.add_template("placeholder", template)
        .map_err(|e| RedactError::invalid_pattern(pattern_type, format!("bad placeholder template: {}", e)))?;
    Ok(())
}

/// Compiles one catalogue rule, resolving its named validator.
pub fn compile_rule(rule: &PatternRule) -> Result<Pattern, RedactError> {
    validate_pattern_source(&rule.pattern_type, &rule.pattern)?;
    validate_placeholder_template(&rule.pattern_type, &rule.placeholder)?;

    let regex = RegexBuilder::new(&rule.pattern)
        .case_insensitive(rule.case_insensitive)
        .multi_line(rule.multiline)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| RedactError::invalid_pattern(&rule.pattern_type, e.to_string()))?;

    let mut pattern = Pattern::from_regex(
        &rule.pattern_type,
        regex,
        rule.priority,
        &rule.placeholder,
        rule.severity,
    );

    if let Some(name) = &rule.validator {
        let validator = validators::named_validator(name).ok_or_else(|| {
            RedactError::invalid_pattern(&rule.pattern_type, format!("unknown validator '{}'", name))
        })?;
        pattern.validator = Some(validator);
    }
    pattern.timeout_ms = rule.timeout_ms;

    log::debug!(
        target: "redactkit_core::compiler",
        "Pattern '{}' compiled successfully.",
        &rule.pattern_type
    );
    Ok(pattern)
}

/// Compiles a list of rules into a priority-sorted set. Fails on the first invalid rule
/// after logging every failure.
pub fn compile_rules(rules: &[PatternRule]) -> Result<CompiledPatterns, RedactError> {
    debug!("Starting compilation of {} patterns.", rules.len());

    let mut compiled = Vec::with_capacity(rules.len());
    let mut errors = Vec::new();

    for rule in rules {
        match compile_rule(rule) {
            Ok(pattern) => compiled.push(pattern),
            Err(e) => {
                warn!("Rejecting pattern '{}': {}", rule.pattern_type, e);
                errors.push(e);
            }
        }
    }

    if let Some(first) = errors.into_iter().next() {
        return Err(first);
    }

    sort_by_priority(&mut compiled);
    debug!("Finished compiling patterns. Total compiled: {}.", compiled.len());
    Ok(CompiledPatterns { patterns: compiled })
}

fn hash_rules(rules: &[PatternRule]) -> u64 {
    let mut hasher = DefaultHasher::new();
    rules.hash(&mut hasher);
    hasher.finish()
}

/// Returns the compiled form of `rules`, compiling and caching it on first use.
pub fn get_or_compile_rules(rules: &[PatternRule]) -> Result<Arc<CompiledPatterns>, RedactError> {
    let cache_key = hash_rules(rules);

    if let Some(compiled) = COMPILED_PATTERNS_CACHE.read().get(&cache_key) {
        debug!("Serving compiled patterns from cache for key: {}", cache_key);
        return Ok(Arc::clone(compiled));
    }

    debug!("Compiled patterns not found in cache. Compiling now.");
    let compiled = Arc::new(compile_rules(rules)?);
    COMPILED_PATTERNS_CACHE.write().insert(cache_key, Arc::clone(&compiled));
    debug!("Successfully compiled and cached patterns for key: {}", cache_key);
    Ok(compiled)
}

/// Returns the compiled form of every rule in `catalog`.
pub fn get_or_compile_catalog(catalog: &PatternCatalog) -> Result<Arc<CompiledPatterns>, RedactError> {
    get_or_compile_rules(&catalog.patterns)
}
