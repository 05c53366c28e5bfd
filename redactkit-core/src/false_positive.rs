//! Heuristic false-positive classification.
//!
//! A stateless rule cascade over a matched value and its context window. The first rule
//! that fires decides the verdict. A date-shaped value sitting next to identifier words
//! (phone, account, id, code) is exempt from every rule.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref VERSION_CONTEXT: Regex =
        Regex::new(r"(?i)\b(?:version|release|build|revision|rev|changelog)\b|\bv\d+(?:\.\d+)+\b").unwrap();
    static ref DATE_SHAPE: Regex = Regex::new(r"^\d{2}[-/]\d{2}[-/]\d{4}$").unwrap();
    static ref DATE_CONTEXT: Regex =
        Regex::new(r"(?i)\b(?:date|dated|dob|born|birth|birthday|expires?|expiry|issued|deadline|due)\b").unwrap();
    static ref IDENTIFIER_CONTEXT: Regex =
        Regex::new(r"(?i)\b(?:phone|tel|telephone|account|acct|id|code|ref|reference)\b").unwrap();
    static ref TEST_DATA_CONTEXT: Regex = Regex::new(
        r"(?i)\b(?:test|testing|example|demo|sample|placeholder|dummy|fake|lorem|ipsum|mock)\b"
    )
    .unwrap();
}

/// Known runs of sequential digits that are never real identifiers.
const SEQUENTIAL_RUNS: [&str; 11] = [
    "123456",
    "1234567",
    "12345678",
    "123456789",
    "1234567890",
    "0123456789",
    "987654",
    "9876543",
    "98765432",
    "987654321",
    "9876543210",
];

/// Which rule flagged a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalsePositiveReason {
    VersionContext,
    DateContext,
    RepeatedDigits,
    SequentialDigits,
    TestData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FalsePositiveVerdict {
    pub is_false_positive: bool,
    /// How sure the rule is that the value is noise. Zero when unflagged.
    pub confidence: f64,
    pub reason: Option<FalsePositiveReason>,
}

impl FalsePositiveVerdict {
    fn clear() -> Self {
        Self {
            is_false_positive: false,
            confidence: 0.0,
            reason: None,
        }
    }

    fn flagged(reason: FalsePositiveReason, confidence: f64) -> Self {
        Self {
            is_false_positive: true,
            confidence,
            reason: Some(reason),
        }
    }

    /// True when the verdict should reject a candidate at `threshold`.
    pub fn rejects_at(&self, threshold: f64) -> bool {
        self.is_false_positive && self.confidence >= threshold
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FalsePositiveFilter;

impl FalsePositiveFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, value: &str, context: &str) -> FalsePositiveVerdict {
        let date_shaped = DATE_SHAPE.is_match(value.trim());
        if date_shaped && IDENTIFIER_CONTEXT.is_match(context) {
            return FalsePositiveVerdict::clear();
        }

        if VERSION_CONTEXT.is_match(context) {
            return FalsePositiveVerdict::flagged(FalsePositiveReason::VersionContext, 0.9);
        }

        if date_shaped && DATE_CONTEXT.is_match(context) {
            return FalsePositiveVerdict::flagged(FalsePositiveReason::DateContext, 0.8);
        }

        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= 3 {
            let mut chars = digits.chars();
            if let Some(first) = chars.next() {
                if chars.all(|c| c == first) {
                    return FalsePositiveVerdict::flagged(FalsePositiveReason::RepeatedDigits, 0.95);
                }
            }
            if SEQUENTIAL_RUNS.contains(&digits.as_str()) {
                return FalsePositiveVerdict::flagged(FalsePositiveReason::SequentialDigits, 0.9);
            }
        }

        if TEST_DATA_CONTEXT.is_match(context) {
            return FalsePositiveVerdict::flagged(FalsePositiveReason::TestData, 0.85);
        }

        FalsePositiveVerdict::clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_context_is_flagged() {
        let v = FalsePositiveFilter::new().classify("2.4.1", "upgrade to version 2.4.1 today");
        assert!(v.is_false_positive);
        assert_eq!(v.reason, Some(FalsePositiveReason::VersionContext));
    }

    #[test]
    fn dates_near_date_words_are_flagged() {
        let v = FalsePositiveFilter::new().classify("12/05/2023", "invoice date 12/05/2023");
        assert_eq!(v.reason, Some(FalsePositiveReason::DateContext));
    }

    #[test]
    fn date_shapes_near_identifier_words_are_exempt() {
        // Would otherwise trip the version and test-data rules.
        let v = FalsePositiveFilter::new().classify("12-05-2023", "test release account code 12-05-2023");
        assert!(!v.is_false_positive);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn repeated_and_sequential_digits_are_flagged() {
        let f = FalsePositiveFilter::new();
        assert_eq!(f.classify("000-00-0000", "").reason, Some(FalsePositiveReason::RepeatedDigits));
        assert_eq!(f.classify("777777", "").reason, Some(FalsePositiveReason::RepeatedDigits));
        assert_eq!(f.classify("123456789", "").reason, Some(FalsePositiveReason::SequentialDigits));
        assert_eq!(f.classify("987654", "").reason, Some(FalsePositiveReason::SequentialDigits));
        assert!(!f.classify("07700900123", "call me").is_false_positive);
    }

    #[test]
    fn test_vocabulary_is_flagged() {
        let v = FalsePositiveFilter::new().classify("123-45-6789", "test SSN: 123-45-6789");
        assert!(v.rejects_at(0.7));
    }

    #[test]
    fn test_vocabulary_requires_whole_words() {
        let v = FalsePositiveFilter::new().classify("07700900123", "the latest number 07700900123");
        assert!(!v.is_false_positive);
    }
}
