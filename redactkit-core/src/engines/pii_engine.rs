// redactkit-core/src/engines/pii_engine.rs
//! The regex-driven `DetectionEngine` implementation.
//!
//! `PiiEngine` owns the active pattern list, the placeholder memo and the optional result
//! cache. Everything else (matching, scoring, filtering, redaction) is borrowed per call.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{cache_key, ResultCache};
use crate::config::DetectOptions;
use crate::context::ContextScorer;
use crate::detection::{DetectionResult, DetectionStats};
use crate::engine::DetectionEngine;
use crate::errors::RedactError;
use crate::false_positive::FalsePositiveFilter;
use crate::matcher::PatternMatcher;
use crate::multi_pass::{build_passes, run_passes, single_pass_order, Pass};
use crate::overlap::ProcessedRanges;
use crate::patterns::{sort_by_priority, Pattern};
use crate::placeholder::{build_redaction, restore, PlaceholderGenerator, RedactionMap};
use crate::sources::{CatalogSource, IdentityOptimizer, PatternSource, PriorityOptimizer, WhitelistSource};

/// Hash of everything that changes detection output: options plus pattern identities.
fn config_fingerprint(options: &DetectOptions, patterns: &[Pattern]) -> u64 {
    let mut hasher = DefaultHasher::new();
    options.hash_into(&mut hasher);
    for p in patterns {
        p.pattern_type.hash(&mut hasher);
        p.regex.as_str().hash(&mut hasher);
        p.priority.hash(&mut hasher);
        p.placeholder_template.hash(&mut hasher);
        p.severity.hash(&mut hasher);
        p.timeout_ms.hash(&mut hasher);
    }
    hasher.finish()
}

/// Builder for [`PiiEngine`].
pub struct PiiEngineBuilder {
    options: DetectOptions,
    source: Option<Box<dyn PatternSource>>,
    use_default_catalog: bool,
    extra_patterns: Vec<Pattern>,
    optimizer: Option<Arc<dyn PriorityOptimizer>>,
    whitelist_source: Option<Arc<dyn WhitelistSource>>,
    passes: Option<Vec<Pass>>,
}

impl Default for PiiEngineBuilder {
    fn default() -> Self {
        Self {
            options: DetectOptions::default(),
            source: None,
            use_default_catalog: true,
            extra_patterns: Vec::new(),
            optimizer: None,
            whitelist_source: None,
            passes: None,
        }
    }
}

impl PiiEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: DetectOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the built-in catalogue as the source of patterns.
    pub fn pattern_source<S: PatternSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Uses only patterns added through [`pattern`](Self::pattern) or
    /// [`patterns`](Self::patterns).
    pub fn without_default_catalog(mut self) -> Self {
        self.use_default_catalog = false;
        self
    }

    /// Adds a programmatic pattern. It replaces any sourced pattern of the same type.
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.extra_patterns.push(pattern);
        self
    }

    pub fn patterns<I: IntoIterator<Item = Pattern>>(mut self, patterns: I) -> Self {
        self.extra_patterns.extend(patterns);
        self
    }

    pub fn optimizer<O: PriorityOptimizer + 'static>(mut self, optimizer: O) -> Self {
        self.optimizer = Some(Arc::new(optimizer));
        self
    }

    pub fn whitelist_source<W: WhitelistSource + 'static>(mut self, source: W) -> Self {
        self.whitelist_source = Some(Arc::new(source));
        self
    }

    /// Overrides the passes built from `multi_pass_count`. Only used in multi-pass mode.
    pub fn passes(mut self, passes: Vec<Pass>) -> Self {
        self.passes = Some(passes);
        self
    }

    /// Validates the options, compiles the pattern set and builds the engine.
    pub fn build(self) -> Result<PiiEngine, RedactError> {
        self.options.validate()?;

        let mut patterns = match (self.source, self.use_default_catalog) {
            (Some(source), _) => source.active_patterns(&self.options)?,
            (None, true) => CatalogSource::builtin()?.active_patterns(&self.options)?,
            (None, false) => Vec::new(),
        };
        for extra in self.extra_patterns {
            patterns.retain(|p| p.pattern_type != extra.pattern_type);
            patterns.push(extra);
        }
        patterns.retain(|p| {
            let allowed = self.options.allows_type(&p.pattern_type);
            if !allowed {
                debug!("Pattern '{}' is switched off by the detection options.", p.pattern_type);
            }
            allowed
        });

        let optimizer = self.optimizer.unwrap_or_else(|| Arc::new(IdentityOptimizer));
        let mut patterns = optimizer.optimize(patterns);
        sort_by_priority(&mut patterns);

        let passes = if self.options.enable_multi_pass {
            Some(match self.passes {
                Some(passes) => passes,
                None => build_passes(self.options.multi_pass_count, self.options.multi_pass_credential_band)?,
            })
        } else {
            None
        };

        let cache = if self.options.enable_cache {
            Some(ResultCache::new(self.options.cache_size)?)
        } else {
            None
        };

        let fingerprint = config_fingerprint(&self.options, &patterns);
        info!(
            "PII engine ready with {} patterns ({} mode, cache {}).",
            patterns.len(),
            if passes.is_some() { "multi-pass" } else { "single-pass" },
            if cache.is_some() { "on" } else { "off" }
        );

        Ok(PiiEngine {
            patterns: RwLock::new(patterns),
            fingerprint: RwLock::new(fingerprint),
            placeholders: Mutex::new(PlaceholderGenerator::new(self.options.deterministic)),
            options: self.options,
            passes,
            scorer: ContextScorer::new()?,
            filter: FalsePositiveFilter::new(),
            cache,
            optimizer,
            whitelist_source: self.whitelist_source,
        })
    }
}

/// Regex-driven PII detection and reversible redaction.
///
/// Safe to share across threads. Concurrent `detect()` calls serialise on the placeholder
/// memo, so deterministic placeholders stay consistent.
pub struct PiiEngine {
    patterns: RwLock<Vec<Pattern>>,
    fingerprint: RwLock<u64>,
    options: DetectOptions,
    passes: Option<Vec<Pass>>,
    scorer: ContextScorer,
    filter: FalsePositiveFilter,
    placeholders: Mutex<PlaceholderGenerator>,
    cache: Option<ResultCache>,
    optimizer: Arc<dyn PriorityOptimizer>,
    whitelist_source: Option<Arc<dyn WhitelistSource>>,
}

impl fmt::Debug for PiiEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiiEngine")
            .field("patterns", &self.patterns.read().len())
            .field("options", &self.options)
            .field("passes", &self.passes)
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .finish()
    }
}

impl PiiEngine {
    /// Builds an engine over the built-in catalogue.
    pub fn new(options: DetectOptions) -> Result<Self, RedactError> {
        PiiEngineBuilder::new().options(options).build()
    }

    /// Builds an engine over `patterns` only.
    pub fn with_patterns(patterns: Vec<Pattern>, options: DetectOptions) -> Result<Self, RedactError> {
        PiiEngineBuilder::new()
            .options(options)
            .without_default_catalog()
            .patterns(patterns)
            .build()
    }

    pub fn builder() -> PiiEngineBuilder {
        PiiEngineBuilder::new()
    }

    /// Active pattern types, highest priority first.
    pub fn pattern_types(&self) -> Vec<String> {
        self.patterns.read().iter().map(|p| p.pattern_type.clone()).collect()
    }

    pub fn passes(&self) -> Option<&[Pass]> {
        self.passes.as_deref()
    }

    /// Re-applies the priority optimizer, re-sorts the patterns and clears the result cache.
    pub fn reoptimize(&self) {
        let mut patterns = self.patterns.write();
        let mut optimized = self.optimizer.optimize(std::mem::take(&mut *patterns));
        sort_by_priority(&mut optimized);
        *self.fingerprint.write() = config_fingerprint(&self.options, &optimized);
        *patterns = optimized;
        drop(patterns);
        self.clear_cache();
        debug!("Pattern priorities re-optimised; result cache cleared.");
    }

    /// The configuration fingerprint with this run's merged whitelist folded in, so terms
    /// from a whitelist source that change between calls also change the cache key.
    fn run_fingerprint(&self, whitelist: &[String]) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.fingerprint.read().hash(&mut hasher);
        whitelist.hash(&mut hasher);
        hasher.finish()
    }

    fn merged_whitelist(&self) -> Vec<String> {
        let mut whitelist = self.options.whitelist.clone();
        if let Some(source) = &self.whitelist_source {
            whitelist.extend(source.whitelist());
        }
        whitelist
    }
}

impl DetectionEngine for PiiEngine {
    fn detect(&self, text: &str) -> Result<DetectionResult, RedactError> {
        let started = Instant::now();

        let whitelist = self.merged_whitelist();
        let key = self
            .cache
            .as_ref()
            .map(|_| cache_key(text, self.run_fingerprint(&whitelist)));
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(hit) = cache.get(key) {
                debug!("Serving detection result from cache for key: {}", key);
                return Ok(hit);
            }
        }

        let patterns = self.patterns.read();
        let matcher = PatternMatcher::new(text, &self.options, &self.scorer, &self.filter, &whitelist);

        let mut placeholders = self.placeholders.lock();
        placeholders.begin_run();
        let (outcome, passes_run) = match &self.passes {
            Some(passes) => (
                run_passes(&matcher, text, &patterns, passes, &mut placeholders)?,
                passes.len(),
            ),
            None => {
                let ordered = single_pass_order(&patterns);
                let mut ranges = ProcessedRanges::new();
                (matcher.run(text, &ordered, &mut ranges, &mut placeholders)?, 1)
            }
        };
        drop(placeholders);
        drop(patterns);

        let (redacted, detections, redaction_map) = build_redaction(text, outcome.detections);
        let stats = DetectionStats {
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            pii_count: detections.len(),
            passes: passes_run,
        };
        debug!(
            "Detected {} PII items in {:.2}ms ({} pattern failures).",
            stats.pii_count,
            stats.processing_time_ms,
            outcome.failures.len()
        );

        let result = DetectionResult {
            original: text.to_string(),
            redacted,
            detections,
            redaction_map,
            stats,
            failures: outcome.failures,
        };

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.set(key, result.clone());
        }
        Ok(result)
    }

    fn restore(&self, redacted: &str, redaction_map: &RedactionMap) -> String {
        restore(redacted, redaction_map)
    }

    fn options(&self) -> &DetectOptions {
        &self.options
    }

    fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
