// redactkit-core/src/matcher.rs
//! Single-pass pattern matching.
//!
//! Patterns are applied in the order given (highest priority first). Each raw match goes
//! through overlap arbitration, the pattern's validator, the optional false-positive filter,
//! confidence scoring and the whitelist before a placeholder is assigned to it.

use log::{debug, warn};

use redactkit_context::context_window;

use crate::config::DetectOptions;
use crate::context::{ContextScorer, DocumentType};
use crate::detection::{log_detection_debug, log_rejection_debug, Detection};
use crate::errors::{PatternFailure, RedactError};
use crate::false_positive::FalsePositiveFilter;
use crate::overlap::{ProcessedRanges, Span};
use crate::patterns::Pattern;
use crate::placeholder::PlaceholderGenerator;
use crate::safe_regex::{exec_all, ExecLimits};

/// Bytes on each side of a value handed to validators and the false-positive filter.
pub const CONTEXT_RADIUS: usize = 50;

/// Detections accepted by one matcher run plus the patterns that were abandoned.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub detections: Vec<Detection>,
    pub failures: Vec<PatternFailure>,
}

/// Applies patterns to one text under a fixed set of options.
///
/// The matcher borrows everything it needs for the duration of a single `detect()` call;
/// the mutable run state (claimed spans, placeholder memo) is passed into [`run`](Self::run).
pub struct PatternMatcher<'a> {
    options: &'a DetectOptions,
    scorer: &'a ContextScorer,
    filter: &'a FalsePositiveFilter,
    /// Lowercased, non-empty whitelist terms.
    whitelist: Vec<String>,
    doc_type: DocumentType,
    limits: ExecLimits,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(
        text: &str,
        options: &'a DetectOptions,
        scorer: &'a ContextScorer,
        filter: &'a FalsePositiveFilter,
        whitelist: &[String],
    ) -> Self {
        let doc_type = if options.enable_context_analysis {
            ContextScorer::infer_document_type(text)
        } else {
            DocumentType::Document
        };
        debug!("Inferred document type: {:?}", doc_type);

        Self {
            options,
            scorer,
            filter,
            whitelist: whitelist
                .iter()
                .map(|term| term.trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
            doc_type,
            limits: ExecLimits::new(options.regex_timeout_ms, options.max_matches),
        }
    }

    fn is_whitelisted(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.whitelist.iter().any(|term| lowered.contains(term.as_str()))
    }

    /// Runs `patterns` over `text`, claiming spans in `ranges` as detections are accepted.
    ///
    /// A pattern that times out or hits its match ceiling is recorded as a failure and
    /// skipped, unless `continue_on_pattern_error` is off, in which case the error is returned.
    pub fn run(
        &self,
        text: &str,
        patterns: &[&Pattern],
        ranges: &mut ProcessedRanges,
        placeholders: &mut PlaceholderGenerator,
    ) -> Result<MatchOutcome, RedactError> {
        let mut outcome = MatchOutcome::default();

        for pattern in patterns {
            let raw_matches = match exec_all(pattern, text, self.limits.for_pattern(pattern)) {
                Ok(found) => found,
                Err(e) if e.is_pattern_runtime() && self.options.continue_on_pattern_error => {
                    warn!("Skipping pattern '{}' for this call: {}", pattern.pattern_type, e);
                    if let Some(failure) = PatternFailure::from_error(&e) {
                        outcome.failures.push(failure);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!("Pattern '{}' produced {} raw matches.", pattern.pattern_type, raw_matches.len());

            for raw in raw_matches {
                let (start, end) = raw.value_range();
                let Some(span) = Span::new(start, end) else {
                    continue;
                };
                if ranges.overlaps(&span) {
                    continue;
                }
                if let Some(detection) = self.evaluate(text, pattern, span, placeholders)? {
                    ranges.push(span);
                    log_detection_debug(module_path!(), &detection);
                    outcome.detections.push(detection);
                }
            }
        }

        Ok(outcome)
    }

    /// Steps 4-9 for one candidate that survived overlap arbitration.
    fn evaluate(
        &self,
        text: &str,
        pattern: &Pattern,
        span: Span,
        placeholders: &mut PlaceholderGenerator,
    ) -> Result<Option<Detection>, RedactError> {
        let value = &text[span.start..span.end];
        let context = context_window(text, span.start, span.end, CONTEXT_RADIUS);

        if !pattern.accepts(value, context) {
            let reason = RedactError::ValidationFailed(pattern.pattern_type.clone()).to_string();
            log_rejection_debug(module_path!(), &pattern.pattern_type, value, &reason);
            return Ok(None);
        }

        if self.options.enable_false_positive_filter {
            let verdict = self.filter.classify(value, context);
            if verdict.rejects_at(self.options.false_positive_threshold) {
                log_rejection_debug(module_path!(), &pattern.pattern_type, value, "false positive");
                return Ok(None);
            }
        }

        let confidence = if self.options.enable_context_analysis {
            self.scorer
                .score_in(self.doc_type, text, value, &pattern.pattern_type, span)
        } else {
            1.0
        };
        if confidence < self.options.confidence_threshold {
            log_rejection_debug(module_path!(), &pattern.pattern_type, value, "low confidence");
            return Ok(None);
        }

        if self.is_whitelisted(value) {
            log_rejection_debug(module_path!(), &pattern.pattern_type, value, "whitelisted");
            return Ok(None);
        }

        let placeholder = placeholders.placeholder_for(value, pattern, text)?;
        Ok(Some(Detection {
            pattern_type: pattern.pattern_type.clone(),
            value: value.to_string(),
            placeholder,
            span,
            severity: pattern.severity,
            confidence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Severity;

    struct Fixture {
        options: DetectOptions,
        scorer: ContextScorer,
        filter: FalsePositiveFilter,
    }

    impl Fixture {
        fn new(options: DetectOptions) -> Self {
            Self {
                options,
                scorer: ContextScorer::new().unwrap(),
                filter: FalsePositiveFilter::new(),
            }
        }

        fn run(&self, text: &str, patterns: &[&Pattern], whitelist: &[String]) -> MatchOutcome {
            let matcher = PatternMatcher::new(text, &self.options, &self.scorer, &self.filter, whitelist);
            let mut ranges = ProcessedRanges::new();
            let mut placeholders = PlaceholderGenerator::new(false);
            matcher.run(text, patterns, &mut ranges, &mut placeholders).unwrap()
        }
    }

    fn pattern(t: &str, source: &str, priority: i32) -> Pattern {
        Pattern::new(t, source, priority, &format!("[{}_{{n}}]", t), Severity::High).unwrap()
    }

    #[test]
    fn higher_priority_pattern_keeps_overlapping_text() {
        let fx = Fixture::new(DetectOptions::default().with_context_analysis(false));
        let long = pattern("LONG", r"\d{3}-\d{2}-\d{4}", 90);
        let short = pattern("SHORT", r"\d{4}", 10);
        let out = fx.run("id 123-45-6789 and 9999", &[&long, &short], &[]);
        let types: Vec<&str> = out.detections.iter().map(|d| d.pattern_type.as_str()).collect();
        assert_eq!(types, vec!["LONG", "SHORT"]);
        assert_eq!(out.detections[1].value, "9999");
    }

    #[test]
    fn capture_group_defines_the_span() {
        let fx = Fixture::new(DetectOptions::default().with_context_analysis(false));
        let p = pattern("KEY", r"key=(\w+)", 50);
        let out = fx.run("set key=abc123 now", &[&p], &[]);
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].value, "abc123");
        assert_eq!(out.detections[0].span, Span::new(8, 14).unwrap());
    }

    #[test]
    fn validator_and_whitelist_reject_candidates() {
        let fx = Fixture::new(DetectOptions::default().with_context_analysis(false));
        let p = pattern("CODE", r"[A-Z]{3}\d{3}", 50).with_validator(|v: &str, _: &str| !v.starts_with("ZZZ"));
        let whitelist = vec!["abc".to_string()];
        let out = fx.run("ZZZ111 ABC222 QRS333", &[&p], &whitelist);
        let values: Vec<&str> = out.detections.iter().map(|d| d.value.as_str()).collect();
        assert_eq!(values, vec!["QRS333"]);
    }

    #[test]
    fn false_positive_filter_drops_test_data() {
        let options = DetectOptions::default().with_false_positive_filter(true);
        let fx = Fixture::new(options);
        let p = pattern("US_SSN", r"\b\d{3}-\d{2}-\d{4}\b", 85);
        assert!(fx.run("test SSN: 123-45-6789", &[&p], &[]).detections.is_empty());
    }

    #[test]
    fn confidence_is_one_without_context_analysis() {
        let fx = Fixture::new(DetectOptions::default().with_context_analysis(false));
        let p = pattern("WORD", r"secret", 50);
        let out = fx.run("an example secret", &[&p], &[]);
        assert_eq!(out.detections[0].confidence, 1.0);
    }

    #[test]
    fn runtime_failures_are_recorded_and_skipped() {
        let mut options = DetectOptions::default().with_context_analysis(false);
        options.max_matches = 3;
        let fx = Fixture::new(options);
        let noisy = pattern("NOISY", r"a", 90);
        let email = pattern("EMAIL", r"\S+@\S+", 80);
        let out = fx.run("aaaa bob@x.io", &[&noisy, &email], &[]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].pattern_type, "NOISY");
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].value, "bob@x.io");
    }

    #[test]
    fn runtime_failures_abort_when_configured() {
        let mut options = DetectOptions::default().with_context_analysis(false);
        options.max_matches = 3;
        options.continue_on_pattern_error = false;
        let fx = Fixture::new(options);
        let noisy = pattern("NOISY", r"a", 90);
        let matcher = PatternMatcher::new("aaaa", &fx.options, &fx.scorer, &fx.filter, &[]);
        let mut ranges = ProcessedRanges::new();
        let mut placeholders = PlaceholderGenerator::new(false);
        let err = matcher.run("aaaa", &[&noisy], &mut ranges, &mut placeholders).unwrap_err();
        assert!(matches!(err, RedactError::RegexMaxMatches { .. }));
    }
}
