//! Configuration management for `redactkit-core`.
//!
//! This module defines the serialisable pattern catalogue (`PatternRule`, `PatternCatalog`)
//! and the engine's option surface (`DetectOptions`). It handles YAML loading, merging of a
//! user catalogue over the defaults, and validation of both.
//!
//! License: MIT OR Apache-2.0

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::errors::RedactError;
use crate::patterns::compiler::{validate_pattern_source, validate_placeholder_template};
use crate::validators;

/// Maximum allowed length for a regex pattern string.
pub const MAX_PATTERN_LENGTH: usize = 5000;

/// How damaging a leak of the matched value would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        f.write_str(s)
    }
}

/// A single PII pattern as written in a catalogue file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternRule {
    /// Unique type identifier (e.g., "EMAIL", "UK_MOBILE").
    pub pattern_type: String,
    /// Human-readable description of what the pattern targets.
    pub description: Option<String>,
    /// The regex source. When it has a capturing group, group 1 is the reported value.
    pub pattern: String,
    /// Higher priorities are matched first and win overlaps.
    pub priority: i32,
    /// Placeholder template containing a `{n}` slot, e.g. `[EMAIL_{n}]`.
    pub placeholder: String,
    pub severity: Severity,
    /// Name of a built-in semantic validator (see `validators::named_validator`).
    pub validator: Option<String>,
    pub case_insensitive: bool,
    pub multiline: bool,
    /// Per-pattern time budget; falls back to `DetectOptions::regex_timeout_ms`.
    pub timeout_ms: Option<u64>,
    /// Explicit override for enabling/disabling the pattern.
    pub enabled: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl Default for PatternRule {
    fn default() -> Self {
        Self {
            pattern_type: String::new(),
            description: None,
            pattern: String::new(),
            priority: 50,
            placeholder: "[REDACTED_{n}]".to_string(),
            severity: Severity::Medium,
            validator: None,
            case_insensitive: false,
            multiline: false,
            timeout_ms: None,
            enabled: None,
            tags: None,
        }
    }
}

impl PatternRule {
    pub fn new(pattern_type: &str, pattern: &str, priority: i32, placeholder: &str) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            pattern: pattern.to_string(),
            priority,
            placeholder: placeholder.to_string(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_validator(mut self, name: &str) -> Self {
        self.validator = Some(name.to_string());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// The top-level catalogue of PII patterns.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct PatternCatalog {
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
}

impl PatternCatalog {
    /// Loads a catalogue from a YAML file and validates it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading pattern catalogue from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalogue file {}", path.display()))?;
        let catalog = Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to load catalogue file {}", path.display()))?;
        info!("Loaded {} patterns from file {}.", catalog.patterns.len(), path.display());
        Ok(catalog)
    }

    /// Parses and validates a catalogue from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: PatternCatalog = serde_yml::from_str(yaml).context("Failed to parse pattern catalogue")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads the built-in catalogue embedded in the library.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default patterns from embedded string...");
        let default_yaml = include_str!("../config/default_patterns.yaml");
        let catalog: PatternCatalog = serde_yml::from_str(default_yaml)
            .context("Failed to parse default patterns")?;
        debug!("Loaded {} default patterns.", catalog.patterns.len());
        Ok(catalog)
    }

    /// Checks pattern integrity: unique names, sane regex sources, usable templates and
    /// known validator names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();

        for rule in &self.patterns {
            if rule.pattern_type.is_empty() {
                errors.push("A pattern has an empty `pattern_type` field.".to_string());
                continue;
            }
            if !seen.insert(rule.pattern_type.as_str()) {
                errors.push(format!("Duplicate pattern type found: '{}'.", rule.pattern_type));
            }
            if let Err(e) = validate_pattern_source(&rule.pattern_type, &rule.pattern) {
                errors.push(e.to_string());
            } else if let Err(e) = regex::Regex::new(&rule.pattern) {
                errors.push(format!("Pattern '{}' has an invalid regex: {}", rule.pattern_type, e));
            }
            if let Err(e) = validate_placeholder_template(&rule.pattern_type, &rule.placeholder) {
                errors.push(e.to_string());
            }
            if let Some(name) = &rule.validator {
                if validators::named_validator(name).is_none() {
                    errors.push(format!(
                        "Pattern '{}' references unknown validator '{}'.",
                        rule.pattern_type, name
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Pattern catalogue validation failed:\n{}", errors.join("\n")))
        }
    }

    /// Keeps only the patterns the options allow: category switches, the type allow-list
    /// and per-rule `enabled` overrides.
    pub fn filter_for(&self, options: &DetectOptions) -> Vec<PatternRule> {
        if let Some(allow) = &options.patterns {
            let known: HashSet<String> = self.patterns.iter().map(|r| r.pattern_type.to_uppercase()).collect();
            for missing in allow.iter().filter(|t| !known.contains(&t.to_uppercase())) {
                warn!("Pattern type '{}' in `patterns` allow-list does not exist.", missing);
            }
        }

        self.patterns
            .iter()
            .filter(|rule| rule.is_enabled())
            .filter(|rule| options.allows_type(&rule.pattern_type))
            .cloned()
            .collect()
    }
}

/// Merges a user catalogue over the defaults; user rules replace defaults of the same type.
pub fn merge_catalogs(default_catalog: PatternCatalog, user_catalog: Option<PatternCatalog>) -> PatternCatalog {
    debug!("merge_catalogs called. Initial default patterns count: {}", default_catalog.patterns.len());

    let mut order: Vec<String> = Vec::with_capacity(default_catalog.patterns.len());
    let mut by_type: HashMap<String, PatternRule> = HashMap::new();
    for rule in default_catalog.patterns {
        order.push(rule.pattern_type.clone());
        by_type.insert(rule.pattern_type.clone(), rule);
    }

    if let Some(user) = user_catalog {
        debug!("User catalogue provided. Merging {} user patterns.", user.patterns.len());
        for rule in user.patterns {
            if !by_type.contains_key(&rule.pattern_type) {
                order.push(rule.pattern_type.clone());
            }
            by_type.insert(rule.pattern_type.clone(), rule);
        }
    }

    let patterns: Vec<PatternRule> = order.into_iter().filter_map(|t| by_type.remove(&t)).collect();
    debug!("Final total patterns after merge: {}", patterns.len());
    PatternCatalog { patterns }
}

/// Options recognised by the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DetectOptions {
    pub include_names: bool,
    pub include_emails: bool,
    pub include_phones: bool,
    pub include_addresses: bool,
    /// Case-insensitive allow-list of pattern types. `None` allows all.
    pub patterns: Option<Vec<String>>,
    /// Extra catalogue-style patterns compiled when the engine is built.
    pub custom_patterns: Vec<PatternRule>,
    /// Values containing any of these terms (case-insensitive) are never redacted.
    pub whitelist: Vec<String>,
    pub deterministic: bool,
    pub confidence_threshold: f64,
    pub enable_context_analysis: bool,
    pub enable_false_positive_filter: bool,
    pub false_positive_threshold: f64,
    pub enable_multi_pass: bool,
    pub multi_pass_count: usize,
    /// Reserve the top priority band (90-100) for credential-like types in multi-pass mode.
    pub multi_pass_credential_band: bool,
    pub enable_cache: bool,
    pub cache_size: usize,
    pub regex_timeout_ms: u64,
    pub max_matches: usize,
    /// When false, the first pattern timeout or match-ceiling failure aborts `detect()`.
    pub continue_on_pattern_error: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            include_names: true,
            include_emails: true,
            include_phones: true,
            include_addresses: true,
            patterns: None,
            custom_patterns: Vec::new(),
            whitelist: Vec::new(),
            deterministic: true,
            confidence_threshold: 0.5,
            enable_context_analysis: true,
            enable_false_positive_filter: false,
            false_positive_threshold: 0.7,
            enable_multi_pass: false,
            multi_pass_count: 3,
            multi_pass_credential_band: true,
            enable_cache: false,
            cache_size: 100,
            regex_timeout_ms: 100,
            max_matches: 10_000,
            continue_on_pattern_error: true,
        }
    }
}

impl DetectOptions {
    /// Loads options from a YAML file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        let options: DetectOptions = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse options file {}", path.display()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), RedactError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RedactError::InvalidConfig(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.false_positive_threshold) {
            return Err(RedactError::InvalidConfig(format!(
                "false_positive_threshold must be within [0, 1], got {}",
                self.false_positive_threshold
            )));
        }
        if !(2..=5).contains(&self.multi_pass_count) {
            return Err(RedactError::InvalidConfig(format!(
                "multi_pass_count must be between 2 and 5, got {}",
                self.multi_pass_count
            )));
        }
        if self.cache_size == 0 {
            return Err(RedactError::InvalidConfig("cache_size must be greater than 0".to_string()));
        }
        if self.max_matches == 0 {
            return Err(RedactError::InvalidConfig("max_matches must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Applies the `include_*` category switches to a pattern type id.
    pub fn category_allows(&self, pattern_type: &str) -> bool {
        let upper = pattern_type.to_uppercase();
        let has = |fragments: &[&str]| fragments.iter().any(|f| upper.contains(f));
        if !self.include_names && has(&["NAME"]) {
            return false;
        }
        if !self.include_emails && has(&["EMAIL"]) {
            return false;
        }
        if !self.include_phones && has(&["PHONE", "MOBILE"]) {
            return false;
        }
        if !self.include_addresses && has(&["ADDRESS", "POSTCODE", "ZIP"]) {
            return false;
        }
        true
    }

    /// True when both the category switches and the `patterns` allow-list admit
    /// `pattern_type`. The allow-list comparison ignores case.
    pub fn allows_type(&self, pattern_type: &str) -> bool {
        self.category_allows(pattern_type)
            && self
                .patterns
                .as_ref()
                .map_or(true, |list| list.iter().any(|t| t.eq_ignore_ascii_case(pattern_type)))
    }

    /// Feeds every option that changes detection output into `state`.
    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.include_names.hash(state);
        self.include_emails.hash(state);
        self.include_phones.hash(state);
        self.include_addresses.hash(state);
        self.patterns.hash(state);
        self.custom_patterns.hash(state);
        self.whitelist.hash(state);
        self.deterministic.hash(state);
        self.confidence_threshold.to_bits().hash(state);
        self.enable_context_analysis.hash(state);
        self.enable_false_positive_filter.hash(state);
        self.false_positive_threshold.to_bits().hash(state);
        self.enable_multi_pass.hash(state);
        self.multi_pass_count.hash(state);
        self.multi_pass_credential_band.hash(state);
        self.max_matches.hash(state);
    }

    pub fn with_whitelist<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_patterns(mut self, types: &[&str]) -> Self {
        self.patterns = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_false_positive_filter(mut self, enabled: bool) -> Self {
        self.enable_false_positive_filter = enabled;
        self
    }

    pub fn with_context_analysis(mut self, enabled: bool) -> Self {
        self.enable_context_analysis = enabled;
        self
    }

    pub fn with_multi_pass(mut self, count: usize) -> Self {
        self.enable_multi_pass = true;
        self.multi_pass_count = count;
        self
    }

    pub fn with_cache(mut self, size: usize) -> Self {
        self.enable_cache = true;
        self.cache_size = size;
        self
    }

    pub fn with_regex_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.regex_timeout_ms = timeout_ms;
        self
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }
}
