//! Placeholder generation and reversible redaction.
//!
//! In deterministic mode a value's placeholder id is `fnv1a("{type}:{value.lower()}") % 10000`,
//! memoised for the life of the generator so the same value always gets the same token.
//! Otherwise ids come from per-type counters that reset at the start of each run.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use std::collections::{BTreeMap, HashMap};
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::detection::Detection;
use crate::errors::RedactError;
use crate::patterns::Pattern;

/// Placeholder -> original value. The sole input `restore` needs.
pub type RedactionMap = BTreeMap<String, String>;

const ID_SPACE: u32 = 10_000;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Renders `template`'s `{n}` slot with `id`.
pub fn render_placeholder(template: &str, id: &str) -> Result<String, RedactError> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("placeholder", template)
        .map_err(|e| RedactError::InvalidConfig(format!("bad placeholder template '{}': {}", template, e)))?;
    let ctx = serde_json::json!({ "n": id });
    tt.render("placeholder", &ctx)
        .map_err(|e| RedactError::InvalidConfig(format!("failed to render placeholder '{}': {}", template, e)))
}

/// Hands out placeholder tokens and remembers which value each one stands for.
///
/// A token is never issued if it already occurs in the text being redacted, so `restore`
/// cannot confuse a pre-existing token with one it should expand.
#[derive(Debug, Default)]
pub struct PlaceholderGenerator {
    deterministic: bool,
    /// (type, value) -> placeholder
    memo: HashMap<(String, String), String>,
    /// Replacements for memoised tokens that occur in the current run's text.
    shadowed: HashMap<(String, String), String>,
    /// placeholder -> value, to keep tokens unique across different values
    assigned: HashMap<String, String>,
    counters: HashMap<String, u32>,
}

impl PlaceholderGenerator {
    pub fn new(deterministic: bool) -> Self {
        Self {
            deterministic,
            ..Default::default()
        }
    }

    /// Called at the start of every detection run. Non-deterministic generators forget all
    /// previous assignments; deterministic ones keep them.
    pub fn begin_run(&mut self) {
        self.shadowed.clear();
        if !self.deterministic {
            self.memo.clear();
            self.assigned.clear();
            self.counters.clear();
        }
    }

    /// Returns the placeholder for `value` detected by `pattern` in `text`, creating one if
    /// needed.
    pub fn placeholder_for(&mut self, value: &str, pattern: &Pattern, text: &str) -> Result<String, RedactError> {
        let key = (pattern.pattern_type.clone(), value.to_string());
        if let Some(local) = self.shadowed.get(&key) {
            return Ok(local.clone());
        }
        let memoised = match self.memo.get(&key) {
            Some(existing) if !text.contains(existing.as_str()) => return Ok(existing.clone()),
            Some(_) => {
                debug!(
                    "Placeholder for type '{}' already occurs in the input, issuing a replacement for this run.",
                    pattern.pattern_type
                );
                true
            }
            None => false,
        };

        let placeholder = if self.deterministic {
            self.deterministic_placeholder(value, pattern, text)?
        } else {
            self.counted_placeholder(pattern, text)?
        };

        self.assigned.insert(placeholder.clone(), value.to_string());
        if memoised {
            self.shadowed.insert(key, placeholder.clone());
        } else {
            self.memo.insert(key, placeholder.clone());
        }
        Ok(placeholder)
    }

    fn deterministic_placeholder(&self, value: &str, pattern: &Pattern, text: &str) -> Result<String, RedactError> {
        let seed = fnv1a_32(&format!("{}:{}", pattern.pattern_type, value.to_lowercase())) % ID_SPACE;
        // Probe forward on collision so two values never share a token.
        for step in 0..ID_SPACE {
            let id = format!("{:04}", (seed + step) % ID_SPACE);
            let candidate = render_placeholder(&pattern.placeholder_template, &id)?;
            if text.contains(candidate.as_str()) {
                continue;
            }
            match self.assigned.get(&candidate) {
                Some(owner) if owner != value => {
                    debug!("Placeholder collision for type '{}', probing next id.", pattern.pattern_type);
                }
                _ => return Ok(candidate),
            }
        }
        Err(RedactError::InvalidConfig(format!(
            "placeholder id space exhausted for type '{}'",
            pattern.pattern_type
        )))
    }

    fn counted_placeholder(&mut self, pattern: &Pattern, text: &str) -> Result<String, RedactError> {
        loop {
            let counter = self.counters.entry(pattern.pattern_type.clone()).or_insert(0);
            *counter += 1;
            let candidate = render_placeholder(&pattern.placeholder_template, &counter.to_string())?;
            // Types may share a template, e.g. UK_MOBILE and US_PHONE both render [PHONE_n].
            if !self.assigned.contains_key(&candidate) && !text.contains(candidate.as_str()) {
                return Ok(candidate);
            }
        }
    }
}

/// Splices placeholders into `text`, working from the last detection backwards so earlier
/// offsets stay valid. Returns the redacted text, the detections in ascending order, and
/// the reversible map.
pub fn build_redaction(text: &str, mut detections: Vec<Detection>) -> (String, Vec<Detection>, RedactionMap) {
    detections.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut redacted = text.to_string();
    let mut map = RedactionMap::new();
    for detection in &detections {
        redacted.replace_range(detection.span.start..detection.span.end, &detection.placeholder);
        map.insert(detection.placeholder.clone(), detection.value.clone());
    }

    detections.reverse();
    (redacted, detections, map)
}

/// Puts every original value back. Placeholders are substituted as literal strings,
/// longest first so no token is clobbered by a shorter one it contains.
pub fn restore(redacted: &str, map: &RedactionMap) -> String {
    let mut entries: Vec<(&String, &String)> = map.iter().collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    entries
        .into_iter()
        .fold(redacted.to_string(), |acc, (placeholder, original)| acc.replace(placeholder.as_str(), original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Severity;
    use crate::overlap::Span;

    fn email() -> Pattern {
        Pattern::new("EMAIL", r"\S+@\S+", 80, "[EMAIL_{n}]", Severity::High).unwrap()
    }

    fn detection(value: &str, start: usize, placeholder: &str) -> Detection {
        Detection {
            pattern_type: "EMAIL".to_string(),
            value: value.to_string(),
            placeholder: placeholder.to_string(),
            span: Span::new(start, start + value.len()).unwrap(),
            severity: Severity::High,
            confidence: 1.0,
        }
    }

    #[test]
    fn fnv_is_stable() {
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
        assert_eq!(fnv1a_32("EMAIL:john@example.com"), fnv1a_32("EMAIL:john@example.com"));
    }

    #[test]
    fn deterministic_placeholders_are_reused_across_runs() {
        let mut gen = PlaceholderGenerator::new(true);
        let p = email();
        gen.begin_run();
        let first = gen.placeholder_for("john@example.com", &p, "").unwrap();
        gen.begin_run();
        let second = gen.placeholder_for("john@example.com", &p, "").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("[EMAIL_") && first.ends_with(']'));
        assert_eq!(first.len(), "[EMAIL_0000]".len());
    }

    #[test]
    fn counters_reset_each_run_when_not_deterministic() {
        let mut gen = PlaceholderGenerator::new(false);
        let p = email();
        gen.begin_run();
        assert_eq!(gen.placeholder_for("a@x.io", &p, "").unwrap(), "[EMAIL_1]");
        assert_eq!(gen.placeholder_for("b@x.io", &p, "").unwrap(), "[EMAIL_2]");
        assert_eq!(gen.placeholder_for("a@x.io", &p, "").unwrap(), "[EMAIL_1]");
        gen.begin_run();
        assert_eq!(gen.placeholder_for("b@x.io", &p, "").unwrap(), "[EMAIL_1]");
    }

    #[test]
    fn different_values_never_share_a_placeholder() {
        let mut gen = PlaceholderGenerator::new(true);
        let p = email();
        // Same lowercase form, so the same hash seed.
        let upper = gen.placeholder_for("John@Example.com", &p, "").unwrap();
        let lower = gen.placeholder_for("john@example.com", &p, "").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn tokens_already_in_the_text_are_skipped() {
        let mut gen = PlaceholderGenerator::new(false);
        let p = email();
        gen.begin_run();
        let text = "see [EMAIL_1] and [EMAIL_2], then a@x.io";
        assert_eq!(gen.placeholder_for("a@x.io", &p, text).unwrap(), "[EMAIL_3]");
    }

    #[test]
    fn memoised_token_is_replaced_for_one_run_when_present_in_text() {
        let mut gen = PlaceholderGenerator::new(true);
        let p = email();
        gen.begin_run();
        let usual = gen.placeholder_for("a@x.io", &p, "a@x.io").unwrap();

        gen.begin_run();
        let text = format!("see {} and a@x.io", usual);
        let replacement = gen.placeholder_for("a@x.io", &p, &text).unwrap();
        assert_ne!(replacement, usual);
        assert!(!text.contains(replacement.as_str()));
        assert_eq!(gen.placeholder_for("a@x.io", &p, &text).unwrap(), replacement);

        gen.begin_run();
        assert_eq!(gen.placeholder_for("a@x.io", &p, "a@x.io").unwrap(), usual);
    }

    #[test]
    fn redaction_round_trips() {
        let text = "mail a@x.io and b@y.io";
        let detections = vec![detection("a@x.io", 5, "[EMAIL_1]"), detection("b@y.io", 16, "[EMAIL_22]")];
        let (redacted, ordered, map) = build_redaction(text, detections);
        assert_eq!(redacted, "mail [EMAIL_1] and [EMAIL_22]");
        assert_eq!(ordered[0].value, "a@x.io");
        assert_eq!(restore(&redacted, &map), text);
    }

    #[test]
    fn restore_treats_placeholders_literally() {
        let mut map = RedactionMap::new();
        map.insert("[A.*_1]".to_string(), "secret".to_string());
        assert_eq!(restore("x [A.*_1] y [AB_1]", &map), "x secret y [AB_1]");
    }
}
