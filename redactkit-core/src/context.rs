// redactkit-core/src/context.rs
//! Context-aware confidence scoring.
//!
//! Every candidate starts at [`BASE_CONFIDENCE`]. The score is then nudged by the kind of
//! document being processed, by category keywords found near the value, and by short
//! phrases immediately preceding it. The result is clamped to `[0, 1]`.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use redactkit_context::{clamp_to_char_boundary, preceding_text, ContextScanner, KeywordCategory};

use crate::errors::RedactError;
use crate::overlap::Span;
use crate::patterns::is_credential_type;

pub const BASE_CONFIDENCE: f64 = 0.7;
/// Bytes sampled from the start of a text when inferring its document type.
pub const DOCUMENT_SAMPLE_LEN: usize = 1000;
/// Bytes scanned on each side of a value for category keywords.
pub const KEYWORD_RADIUS: usize = 250;
/// Bytes before a value examined by the proximity rules.
pub const PROXIMITY_RADIUS: usize = 40;
/// Indicator hits a document type needs before it is preferred over `Document`.
const MIN_INDICATOR_HITS: usize = 2;

const CONTACT_TYPES: [&str; 6] = ["EMAIL", "PHONE", "MOBILE", "NAME", "ADDRESS", "POSTCODE"];
const MEDICAL_TYPES: [&str; 5] = ["NHS", "MEDICAL", "HEALTH", "PATIENT", "MRN"];
const FINANCIAL_TYPES: [&str; 7] = ["CARD", "IBAN", "BANK", "ACCOUNT", "SORT_CODE", "SWIFT", "TAX"];
const NUMERIC_TYPES: [&str; 10] = [
    "PHONE", "MOBILE", "SSN", "NUMBER", "CARD", "ACCOUNT", "NINO", "NHS", "DATE", "IP",
];

/// The coarse kind of text being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Email,
    Code,
    Chat,
    Document,
}

struct ProximityRule {
    name: &'static str,
    preceding: Regex,
    delta: f64,
    applies_to: fn(&str) -> bool,
}

fn type_has(pattern_type: &str, fragments: &[&str]) -> bool {
    let upper = pattern_type.to_uppercase();
    fragments.iter().any(|f| upper.contains(f))
}

lazy_static! {
    static ref EMAIL_INDICATORS: Vec<Regex> = vec![
        Regex::new(r"(?mi)^(?:subject|from|to|cc|bcc|reply-to|sent):").unwrap(),
        Regex::new(r"(?i)\b(?:dear|regards|sincerely|kind regards|best wishes|cheers)\b").unwrap(),
    ];
    static ref CODE_INDICATORS: Vec<Regex> = vec![
        Regex::new(r"\b(?:function|const|let|var|class|def|import|return|public|private|fn|struct|impl|async|await)\b").unwrap(),
        Regex::new(r"(?m)[{};]\s*$").unwrap(),
        Regex::new(r"=>|->|==|!=").unwrap(),
    ];
    static ref CHAT_INDICATORS: Vec<Regex> = vec![
        Regex::new(r"\[?\b\d{1,2}:\d{2}(?::\d{2})?\s?(?:[AaPp][Mm])?\]?").unwrap(),
        Regex::new(r"(?:^|\s)@\w+").unwrap(),
        Regex::new(r"(?i)\b(?:lol|brb|omg|thx|btw|imo)\b").unwrap(),
    ];
    static ref PROXIMITY_RULES: Vec<ProximityRule> = vec![
        ProximityRule {
            name: "salutation",
            preceding: Regex::new(r"(?i)\b(?:dear|hi|hello|mr|mrs|ms|miss|dr|prof|sir|madam)\.?,?\s*$").unwrap(),
            delta: 0.2,
            applies_to: |t| type_has(t, &["NAME"]),
        },
        ProximityRule {
            name: "article",
            preceding: Regex::new(r"(?i)\b(?:the|a|an)\s+$").unwrap(),
            delta: -0.3,
            applies_to: |t| type_has(t, &["NAME"]),
        },
        ProximityRule {
            name: "version",
            preceding: Regex::new(r"(?i)(?:\bversion|\brelease|\bbuild|\bv)[\s:#.]*$").unwrap(),
            delta: -0.4,
            applies_to: |t| type_has(t, &NUMERIC_TYPES),
        },
        ProximityRule {
            name: "email label",
            preceding: Regex::new(r"(?i)\b(?:e-?mail|contact|mail\s+to|write\s+to)\b[\s:]*$").unwrap(),
            delta: 0.1,
            applies_to: |t| type_has(t, &["EMAIL"]),
        },
        ProximityRule {
            name: "phone label",
            preceding: Regex::new(r"(?i)\b(?:phone|tel|mobile|cell|call|ring|text|fax)\b[\s:.#]*$").unwrap(),
            delta: 0.15,
            applies_to: |t| type_has(t, &["PHONE", "MOBILE"]),
        },
        ProximityRule {
            name: "ssn label",
            preceding: Regex::new(r"(?i)\b(?:ssn|social\s+security(?:\s+number)?)\b[\s:#.]*$").unwrap(),
            delta: 0.15,
            applies_to: |t| type_has(t, &["SSN"]),
        },
        ProximityRule {
            name: "credential assignment",
            preceding: Regex::new(r#"(?i)(?:key|token|secret|password|passwd|pwd)\s*[:=]\s*["']?$"#).unwrap(),
            delta: 0.2,
            applies_to: is_credential_type,
        },
    ];
}

fn count_hits(sample: &str, indicators: &[Regex]) -> usize {
    indicators.iter().map(|r| r.find_iter(sample).count()).sum()
}

/// Adjusts raw matches into a confidence in `[0, 1]`.
#[derive(Debug)]
pub struct ContextScorer {
    keywords: ContextScanner,
}

impl ContextScorer {
    pub fn new() -> Result<Self, RedactError> {
        let keywords = ContextScanner::new().map_err(|e| RedactError::ContextInit(e.to_string()))?;
        Ok(Self { keywords })
    }

    /// Infers the document type from the first [`DOCUMENT_SAMPLE_LEN`] bytes of `text`.
    ///
    /// A type needs at least two indicator hits; the type with the most hits wins, with ties
    /// resolved in the order email, code, chat.
    pub fn infer_document_type(text: &str) -> DocumentType {
        let sample = &text[..clamp_to_char_boundary(text, DOCUMENT_SAMPLE_LEN)];
        let candidates = [
            (DocumentType::Email, count_hits(sample, &EMAIL_INDICATORS)),
            (DocumentType::Code, count_hits(sample, &CODE_INDICATORS)),
            (DocumentType::Chat, count_hits(sample, &CHAT_INDICATORS)),
        ];

        let mut best = (DocumentType::Document, MIN_INDICATOR_HITS - 1);
        for (doc_type, hits) in candidates {
            if hits > best.1 {
                best = (doc_type, hits);
            }
        }
        best.0
    }

    /// Scores one candidate, inferring the document type from `text`.
    pub fn score(&self, text: &str, value: &str, pattern_type: &str, span: Span) -> f64 {
        let doc_type = Self::infer_document_type(text);
        self.score_in(doc_type, text, value, pattern_type, span)
    }

    /// Scores one candidate against an already inferred document type.
    pub fn score_in(&self, doc_type: DocumentType, text: &str, value: &str, pattern_type: &str, span: Span) -> f64 {
        if value.trim().is_empty() {
            return 0.0;
        }
        let credential = is_credential_type(pattern_type);
        let mut score = BASE_CONFIDENCE;

        match doc_type {
            DocumentType::Code if !credential => score -= 0.2,
            DocumentType::Email if type_has(pattern_type, &CONTACT_TYPES) => score += 0.1,
            _ => {}
        }

        let flags = self
            .keywords
            .scan_around(text.as_bytes(), span.start, span.end, KEYWORD_RADIUS);
        if flags.contains(KeywordCategory::Example) {
            score -= 0.4;
        }
        if flags.contains(KeywordCategory::Medical) && type_has(pattern_type, &MEDICAL_TYPES) {
            score += 0.15;
        }
        if flags.contains(KeywordCategory::Financial) && type_has(pattern_type, &FINANCIAL_TYPES) {
            score += 0.15;
        }
        if flags.contains(KeywordCategory::Technical) && !credential {
            score -= 0.1;
        }

        let before = preceding_text(text, span.start, PROXIMITY_RADIUS);
        for rule in PROXIMITY_RULES.iter() {
            if (rule.applies_to)(pattern_type) && rule.preceding.is_match(before) {
                debug!("Proximity rule '{}' adjusted '{}' by {:+.2}", rule.name, pattern_type, rule.delta);
                score += rule.delta;
            }
        }

        score.clamp(0.0, 1.0)
    }
}
