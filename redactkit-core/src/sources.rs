// redactkit-core/src/sources.rs
//! Seams to the collaborators that live outside the engine: where patterns come from, how
//! their priorities get tuned, and which values are known to be safe.

use crate::config::{merge_catalogs, DetectOptions, PatternCatalog};
use crate::errors::RedactError;
use crate::patterns::compiler::get_or_compile_rules;
use crate::patterns::Pattern;

/// Supplies the active pattern set for a set of options.
pub trait PatternSource: Send + Sync {
    /// Returns the patterns the options allow, sorted by priority (highest first).
    fn active_patterns(&self, options: &DetectOptions) -> Result<Vec<Pattern>, RedactError>;
}

/// Adjusts pattern priorities, e.g. from learned feedback.
///
/// Implementations must return the same patterns they were given; only `priority` may change.
pub trait PriorityOptimizer: Send + Sync {
    fn optimize(&self, patterns: Vec<Pattern>) -> Vec<Pattern>;
}

/// Supplies whitelist terms that are merged with the user's before each run.
pub trait WhitelistSource: Send + Sync {
    fn whitelist(&self) -> Vec<String>;
}

/// A [`PatternSource`] backed by a YAML pattern catalogue.
///
/// `custom_patterns` from the options are merged over the catalogue (a custom rule replaces
/// a catalogue rule of the same type) before the category switches and allow-list apply.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    catalog: PatternCatalog,
}

impl CatalogSource {
    pub fn new(catalog: PatternCatalog) -> Self {
        Self { catalog }
    }

    /// The embedded default catalogue.
    pub fn builtin() -> Result<Self, RedactError> {
        Ok(Self::new(PatternCatalog::load_default()?))
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }
}

impl PatternSource for CatalogSource {
    fn active_patterns(&self, options: &DetectOptions) -> Result<Vec<Pattern>, RedactError> {
        let custom = (!options.custom_patterns.is_empty()).then(|| PatternCatalog {
            patterns: options.custom_patterns.clone(),
        });
        let rules = merge_catalogs(self.catalog.clone(), custom).filter_for(options);
        let compiled = get_or_compile_rules(&rules)?;
        Ok(compiled.patterns.clone())
    }
}

/// Leaves priorities untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOptimizer;

impl PriorityOptimizer for IdentityOptimizer {
    fn optimize(&self, patterns: Vec<Pattern>) -> Vec<Pattern> {
        patterns
    }
}

/// A fixed list of whitelist terms.
#[derive(Debug, Clone, Default)]
pub struct StaticWhitelist {
    terms: Vec<String>,
}

impl StaticWhitelist {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

impl WhitelistSource for StaticWhitelist {
    fn whitelist(&self) -> Vec<String> {
        self.terms.clone()
    }
}
