// redactkit-core/src/multi_pass.rs
//! Multi-pass detection.
//!
//! The priority axis is cut into ordered bands ([`Pass`]). Each pattern is assigned to the
//! first band that accepts it, bands run in order, and all of them share one
//! [`ProcessedRanges`] so a later band can never claim text an earlier band already took.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::RedactError;
use crate::matcher::{MatchOutcome, PatternMatcher};
use crate::overlap::ProcessedRanges;
use crate::patterns::{Pattern, CREDENTIAL_TYPE_FRAGMENTS};
use crate::placeholder::PlaceholderGenerator;

pub const MIN_PASSES: usize = 2;
pub const MAX_PASSES: usize = 5;
pub const CREDENTIAL_BAND_MIN: i32 = 90;
pub const CREDENTIAL_BAND_MAX: i32 = 100;

/// One priority band of the multi-pass pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pass {
    pub name: String,
    /// Inclusive bounds.
    pub min_priority: i32,
    pub max_priority: i32,
    /// Type-id fragments a pattern must contain one of.
    #[serde(default)]
    pub include_types: Option<Vec<String>>,
    /// Type-id fragments that exclude a pattern.
    #[serde(default)]
    pub exclude_types: Option<Vec<String>>,
}

fn type_matches_any(pattern_type: &str, fragments: &[String]) -> bool {
    let upper = pattern_type.to_uppercase();
    fragments.iter().any(|f| upper.contains(&f.to_uppercase()))
}

impl Pass {
    pub fn new(name: &str, min_priority: i32, max_priority: i32) -> Self {
        Self {
            name: name.to_string(),
            min_priority,
            max_priority,
            include_types: None,
            exclude_types: None,
        }
    }

    pub fn with_include_types(mut self, fragments: &[&str]) -> Self {
        self.include_types = Some(fragments.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_exclude_types(mut self, fragments: &[&str]) -> Self {
        self.exclude_types = Some(fragments.iter().map(|f| f.to_string()).collect());
        self
    }

    /// True when `pattern`'s priority lies in this band and the type filters let it in.
    pub fn accepts(&self, pattern: &Pattern) -> bool {
        if pattern.priority < self.min_priority || pattern.priority > self.max_priority {
            return false;
        }
        if let Some(include) = &self.include_types {
            if !type_matches_any(&pattern.pattern_type, include) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_types {
            if type_matches_any(&pattern.pattern_type, exclude) {
                return false;
            }
        }
        true
    }
}

/// Builds `count` passes covering the whole priority axis.
///
/// With `credential_band`, the first pass is reserved for credential-like types at priority
/// 90-100 and the remaining `count - 1` passes split the axis evenly. The outermost generic
/// bands are open-ended so patterns outside 0-100 still land somewhere.
pub fn build_passes(count: usize, credential_band: bool) -> Result<Vec<Pass>, RedactError> {
    if !(MIN_PASSES..=MAX_PASSES).contains(&count) {
        return Err(RedactError::InvalidConfig(format!(
            "multi_pass_count must be between {} and {}, got {}",
            MIN_PASSES, MAX_PASSES, count
        )));
    }

    let mut passes = Vec::with_capacity(count);
    if credential_band {
        passes.push(
            Pass::new("credentials", CREDENTIAL_BAND_MIN, CREDENTIAL_BAND_MAX)
                .with_include_types(&CREDENTIAL_TYPE_FRAGMENTS),
        );
    }

    let bands = count - passes.len();
    let width = 100 / bands as i32;
    for i in 0..bands as i32 {
        let max_priority = if i == 0 { i32::MAX } else { 100 - i * width };
        let min_priority = if i == bands as i32 - 1 {
            i32::MIN
        } else {
            100 - (i + 1) * width + 1
        };
        passes.push(Pass::new(&format!("band_{}", i + 1), min_priority, max_priority));
    }

    debug!("Built {} passes: {:?}", passes.len(), passes);
    Ok(passes)
}

/// Assigns each pattern to the first pass that accepts it. Patterns no pass accepts are
/// left out. Each group is sorted by priority, highest first.
pub fn partition<'p>(patterns: &'p [Pattern], passes: &[Pass]) -> Vec<Vec<&'p Pattern>> {
    let mut groups: Vec<Vec<&Pattern>> = vec![Vec::new(); passes.len()];
    for pattern in patterns {
        match passes.iter().position(|pass| pass.accepts(pattern)) {
            Some(index) => groups[index].push(pattern),
            None => debug!("Pattern '{}' fits no pass; skipping it.", pattern.pattern_type),
        }
    }
    for group in &mut groups {
        group.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
    groups
}

/// Runs every pass in order over `text` and merges their detections.
pub fn run_passes(
    matcher: &PatternMatcher<'_>,
    text: &str,
    patterns: &[Pattern],
    passes: &[Pass],
    placeholders: &mut PlaceholderGenerator,
) -> Result<MatchOutcome, RedactError> {
    let groups = partition(patterns, passes);
    let mut ranges = ProcessedRanges::new();
    let mut per_pass = Vec::with_capacity(passes.len());

    for (pass, group) in passes.iter().zip(&groups) {
        if group.is_empty() {
            per_pass.push(MatchOutcome::default());
            continue;
        }
        let outcome = matcher.run(text, group, &mut ranges, placeholders)?;
        debug!(
            "Pass '{}' ran {} patterns and accepted {} detections.",
            pass.name,
            group.len(),
            outcome.detections.len()
        );
        per_pass.push(outcome);
    }

    // Shared ranges already prevent cross-pass overlap; this re-check guards the merge.
    let mut merged_ranges = ProcessedRanges::new();
    let mut merged = MatchOutcome::default();
    for outcome in per_pass {
        merged.failures.extend(outcome.failures);
        for detection in outcome.detections {
            if merged_ranges.try_claim(detection.span) {
                merged.detections.push(detection);
            } else {
                warn!(
                    "Dropping overlapping '{}' detection at {}..{} during merge.",
                    detection.pattern_type, detection.span.start, detection.span.end
                );
            }
        }
    }
    Ok(merged)
}

/// Sorted copy of `patterns` for single-pass use.
pub(crate) fn single_pass_order(patterns: &[Pattern]) -> Vec<&Pattern> {
    let mut ordered: Vec<&Pattern> = patterns.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectOptions, Severity};
    use crate::context::ContextScorer;
    use crate::false_positive::FalsePositiveFilter;

    fn pattern(t: &str, source: &str, priority: i32) -> Pattern {
        Pattern::new(t, source, priority, &format!("[{}_{{n}}]", t), Severity::High).unwrap()
    }

    #[test]
    fn bands_cover_the_axis_without_gaps() {
        let passes = build_passes(4, false).unwrap();
        assert_eq!(passes.len(), 4);
        assert_eq!(passes[0].max_priority, i32::MAX);
        assert_eq!(passes[3].min_priority, i32::MIN);
        for pair in passes.windows(2) {
            assert_eq!(pair[0].min_priority, pair[1].max_priority + 1);
        }
    }

    #[test]
    fn credential_band_comes_first() {
        let passes = build_passes(3, true).unwrap();
        assert_eq!(passes.len(), 3);
        assert_eq!(passes[0].name, "credentials");
        assert_eq!((passes[0].min_priority, passes[0].max_priority), (90, 100));
        assert!(passes[0].accepts(&pattern("GITHUB_TOKEN", "ghp_x", 95)));
        assert!(!passes[0].accepts(&pattern("EMAIL", "x@y", 95)));
    }

    #[test]
    fn pass_count_is_bounded() {
        assert!(build_passes(1, false).is_err());
        assert!(build_passes(6, true).is_err());
    }

    #[test]
    fn first_accepting_pass_wins() {
        let passes = vec![
            Pass::new("wide", 0, 100),
            Pass::new("narrow", 40, 60),
        ];
        let patterns = vec![pattern("A", "a", 50), pattern("B", "b", 120)];
        let groups = partition(&patterns, &passes);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].pattern_type, "A");
        assert!(groups[1].is_empty());
    }

    #[test]
    fn exclude_filters_apply() {
        let pass = Pass::new("no_names", 0, 100).with_exclude_types(&["name"]);
        assert!(!pass.accepts(&pattern("PERSON_NAME", "x", 50)));
        assert!(pass.accepts(&pattern("EMAIL", "x", 50)));
    }

    #[test]
    fn later_passes_cannot_claim_earlier_text() {
        let options = DetectOptions::default().with_context_analysis(false);
        let scorer = ContextScorer::new().unwrap();
        let filter = FalsePositiveFilter::new();
        let text = "token=ghp_abcdef123456 and 123456";
        let matcher = PatternMatcher::new(text, &options, &scorer, &filter, &[]);
        let patterns = vec![
            pattern("GITHUB_TOKEN", r"ghp_[a-z0-9]+", 95),
            pattern("DIGITS", r"\d{6}", 20),
        ];
        let passes = build_passes(3, true).unwrap();
        let mut placeholders = PlaceholderGenerator::new(true);
        let out = run_passes(&matcher, text, &patterns, &passes, &mut placeholders).unwrap();
        let types: Vec<&str> = out.detections.iter().map(|d| d.pattern_type.as_str()).collect();
        assert_eq!(types, vec!["GITHUB_TOKEN", "DIGITS"]);
        assert_eq!(out.detections[1].span.start, text.len() - 6);
    }
}
