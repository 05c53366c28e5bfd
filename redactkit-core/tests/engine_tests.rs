// redactkit-core/tests/engine_tests.rs
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use regex::Regex;

use redactkit_core::{
    build_passes, DetectOptions, DetectionEngine, FailureKind, Pass, Pattern, PiiEngine, Severity,
    StaticWhitelist, WhitelistSource,
};

const SCENARIO: &str = "Email john@example.com or call 07700900123";

fn pattern(pattern_type: &str, source: &str, priority: i32) -> Pattern {
    Pattern::new(pattern_type, source, priority, &format!("[{}_{{n}}]", pattern_type), Severity::Medium)
        .expect("test pattern compiles")
}

fn plain_options() -> DetectOptions {
    DetectOptions::default().with_context_analysis(false)
}

#[test_log::test]
fn email_and_phone_are_redacted_with_stable_placeholders() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default())?;
    let first = engine.detect(SCENARIO)?;

    assert_eq!(first.detections.len(), 2);
    assert_eq!(first.redaction_map.len(), 2);
    let values: BTreeSet<&str> = first.redaction_map.values().map(String::as_str).collect();
    assert_eq!(values, BTreeSet::from(["john@example.com", "07700900123"]));

    let token = Regex::new(r"^\[(EMAIL|PHONE)_\d{4}\]$")?;
    for placeholder in first.redaction_map.keys() {
        assert!(token.is_match(placeholder), "unexpected placeholder {}", placeholder);
    }
    assert!(!first.redacted.contains("john@example.com"));
    assert!(!first.redacted.contains("07700900123"));
    for detection in &first.detections {
        assert!(detection.confidence > 0.5);
    }

    let second = engine.detect(SCENARIO)?;
    assert_eq!(first.redacted, second.redacted);

    let fresh = PiiEngine::new(DetectOptions::default())?.detect(SCENARIO)?;
    assert_eq!(first.redacted, fresh.redacted);
    Ok(())
}

#[test]
fn restore_returns_the_original_text() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default())?;
    let inputs = [
        SCENARIO,
        "Card 4111 1111 1111 1111 belongs to Dr. Alice Smith, born 12/03/1984.",
        "Server 192.168.10.42 rejected password: hunter22secret",
        "no pii at all",
        "",
    ];
    for input in inputs {
        let result = engine.detect(input)?;
        assert_eq!(engine.restore(&result.redacted, &result.redaction_map), input);
    }
    Ok(())
}

#[test]
fn placeholders_do_not_depend_on_surrounding_text() -> Result<()> {
    let engine = PiiEngine::with_patterns(vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80)], plain_options())?;
    let a = engine.detect("reach me at ann@corp.test")?;
    let b = engine.detect("ann@corp.test wrote something else entirely")?;

    assert_eq!(a.detections[0].placeholder, b.detections[0].placeholder);

    let other = PiiEngine::with_patterns(vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80)], plain_options())?;
    let c = other.detect("prefix ann@corp.test")?;
    assert_eq!(a.detections[0].placeholder, c.detections[0].placeholder);
    Ok(())
}

#[test]
fn detections_never_overlap() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default().with_context_analysis(false))?;
    let text = "Mr. John Smith, 4111-1111-1111-1111, SW1A 1AA, 10.0.0.1, AB123456C, \
                +44 7700 900123, jane.doe@mail.example.org, 123-45-6789";
    let result = engine.detect(text)?;
    assert!(!result.detections.is_empty());

    let spans: Vec<_> = result.detections.iter().map(|d| d.span).collect();
    for (i, a) in spans.iter().enumerate() {
        for b in &spans[i + 1..] {
            assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
        }
    }
    for window in result.detections.windows(2) {
        assert!(window[0].span.start < window[1].span.start);
    }
    Ok(())
}

#[test]
fn higher_priority_pattern_wins_contested_text() -> Result<()> {
    let engine = PiiEngine::with_patterns(
        vec![pattern("DIGITS", r"\d+", 10), pattern("ID", r"ID-\d+", 90)],
        plain_options(),
    )?;
    let result = engine.detect("ref ID-12345")?;
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].pattern_type, "ID");
    assert_eq!(result.detections[0].value, "ID-12345");
    Ok(())
}

#[test]
fn confidence_stays_within_bounds() -> Result<()> {
    let mut options = DetectOptions::default();
    options.confidence_threshold = 0.0;
    let engine = PiiEngine::new(options)?;
    let text = "Dear Mr. Brown, this is an example. email: sam@example.net phone: 07700900456 \
                version 10.2.0.1 api_key = sk_live_abcdefghijklmnop1234";
    let result = engine.detect(text)?;
    assert!(!result.detections.is_empty());
    for detection in &result.detections {
        assert!((0.0..=1.0).contains(&detection.confidence), "{:?}", detection);
    }
    Ok(())
}

#[test]
fn multi_pass_finds_a_subset_of_single_pass() -> Result<()> {
    let patterns = || {
        vec![
            pattern("ORDER", r"ORD-\d{6}", 95),
            pattern("TICKET", r"TCK-\d{4}", 60),
            pattern("ROOM", r"R\d{3}", 20),
        ]
    };
    let text = "ORD-123456 opened TCK-9876 for R101 and ORD-654321";

    let single = PiiEngine::with_patterns(patterns(), plain_options())?.detect(text)?;
    for count in 2..=5 {
        let mut options = plain_options().with_multi_pass(count);
        options.multi_pass_credential_band = false;
        let engine = PiiEngine::with_patterns(patterns(), options)?;
        assert_eq!(engine.passes().map(<[Pass]>::len), Some(count));

        let multi = engine.detect(text)?;
        assert_eq!(multi.stats.passes, count);
        let single_values: BTreeSet<&str> = single.detections.iter().map(|d| d.value.as_str()).collect();
        for detection in &multi.detections {
            assert!(single_values.contains(detection.value.as_str()));
        }
        assert_eq!(multi.detections.len(), single.detections.len());
    }
    Ok(())
}

#[test]
fn explicit_passes_limit_pattern_types() -> Result<()> {
    let passes = vec![Pass::new("orders_only", 0, 100).with_include_types(&["ORDER"])];
    let engine = PiiEngine::builder()
        .options(plain_options().with_multi_pass(2))
        .without_default_catalog()
        .patterns(vec![pattern("ORDER", r"ORD-\d{6}", 95), pattern("ROOM", r"R\d{3}", 20)])
        .passes(passes)
        .build()?;

    let result = engine.detect("ORD-123456 in R101")?;
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].pattern_type, "ORDER");
    Ok(())
}

#[test]
fn credential_band_is_the_first_pass() -> Result<()> {
    let passes = build_passes(3, true)?;
    assert_eq!(passes.len(), 3);
    assert_eq!(passes[0].name, "credentials");
    assert_eq!(passes[1].name, "band_1");
    Ok(())
}

#[test]
fn cache_is_transparent_and_clearable() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default().with_cache(4))?;
    let uncached = PiiEngine::new(DetectOptions::default())?;

    let first = engine.detect(SCENARIO)?;
    let hit = engine.detect(SCENARIO)?;
    let reference = uncached.detect(SCENARIO)?;

    assert_eq!(first.redacted, hit.redacted);
    assert_eq!(first.detections, hit.detections);
    assert_eq!(first.redaction_map, reference.redaction_map);

    engine.clear_cache();
    let after_clear = engine.detect(SCENARIO)?;
    assert_eq!(after_clear.redacted, first.redacted);
    Ok(())
}

#[test_log::test]
fn test_data_is_dropped_by_the_false_positive_filter() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default().with_false_positive_filter(true))?;
    let result = engine.detect("test SSN: 123-45-6789")?;
    assert!(result.detections.is_empty());
    assert_eq!(result.redacted, "test SSN: 123-45-6789");
    Ok(())
}

#[test_log::test]
fn failing_pattern_is_reported_and_others_still_run() -> Result<()> {
    let mut options = plain_options();
    options.max_matches = 100;
    let engine = PiiEngine::with_patterns(
        vec![pattern("NOISY", r"\w", 90), pattern("EMAIL", r"\S+@\S+\.\w+", 80)],
        options,
    )?;

    let text = format!("{} contact ops@corp.test", "x".repeat(10_000));
    let result = engine.detect(&text)?;

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].pattern_type, "NOISY");
    assert_eq!(result.failures[0].kind, FailureKind::MaxMatches);
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].value, "ops@corp.test");
    Ok(())
}

#[test_log::test]
fn quadratic_pattern_exceeds_its_budget_on_long_input() -> Result<()> {
    // Every match scans to the end of the input looking for the optional `Z` tail.
    let slow = pattern("SLOW", r"é(?:[^Z]*Z)?", 90);
    let engine = PiiEngine::with_patterns(
        vec![slow, pattern("EMAIL", r"\S+@\S+\.\w+", 80)],
        plain_options().with_regex_timeout_ms(50),
    )?;
    let text = format!("{} ops@corp.test", "é".repeat(9_986));
    assert_eq!(text.chars().count(), 10_000);

    let started = Instant::now();
    let result = engine.detect(&text)?;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].pattern_type, "SLOW");
    assert_eq!(result.failures[0].kind, FailureKind::Timeout);
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].value, "ops@corp.test");
    assert_eq!(engine.restore(&result.redacted, &result.redaction_map), text);
    Ok(())
}

#[test_log::test]
fn slow_pattern_times_out_while_others_still_run() -> Result<()> {
    let slow = pattern("WORD", r"\w+", 90).with_timeout_ms(0);
    let engine = PiiEngine::with_patterns(
        vec![slow, pattern("EMAIL", r"\S+@\S+\.\w+", 80)],
        plain_options().with_regex_timeout_ms(50),
    )?;
    let text = format!("{}ops@corp.test", "word ".repeat(2_000));
    let started = Instant::now();
    let result = engine.detect(&text)?;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].pattern_type, "WORD");
    assert_eq!(result.failures[0].kind, FailureKind::Timeout);
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].value, "ops@corp.test");
    Ok(())
}

#[test]
fn engine_wide_budget_applies_to_every_pattern() -> Result<()> {
    let engine = PiiEngine::with_patterns(
        vec![pattern("WORD", r"\w+", 50)],
        plain_options().with_regex_timeout_ms(0),
    )?;
    let text = "word ".repeat(2_000);
    let result = engine.detect(&text)?;

    assert!(result.detections.is_empty());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].kind, FailureKind::Timeout);
    assert_eq!(result.redacted, text);
    Ok(())
}

#[test]
fn non_deterministic_placeholders_count_per_call() -> Result<()> {
    let engine = PiiEngine::with_patterns(
        vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80)],
        plain_options().with_deterministic(false),
    )?;
    let result = engine.detect("a@x.io b@x.io a@x.io")?;

    let placeholders: Vec<&str> = result.detections.iter().map(|d| d.placeholder.as_str()).collect();
    assert_eq!(placeholders, vec!["[EMAIL_1]", "[EMAIL_2]", "[EMAIL_1]"]);
    assert_eq!(result.redaction_map.len(), 2);

    let again = engine.detect("b@x.io")?;
    assert_eq!(again.detections[0].placeholder, "[EMAIL_1]");
    Ok(())
}

#[test]
fn scan_groups_by_severity() -> Result<()> {
    let engine = PiiEngine::new(DetectOptions::default().with_patterns(&["EMAIL", "UK_MOBILE"]))?;
    let summary = engine.scan(SCENARIO)?;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.total, summary.high.len() + summary.medium.len() + summary.low.len());
    Ok(())
}

#[test]
fn whitelist_terms_from_options_and_sources_are_skipped() -> Result<()> {
    let engine = PiiEngine::builder()
        .options(plain_options().with_whitelist(["noreply@"]))
        .without_default_catalog()
        .pattern(pattern("EMAIL", r"\S+@\S+\.\w+", 80))
        .whitelist_source(StaticWhitelist::new(["@internal.test"]))
        .build()?;

    let result = engine.detect("NoReply@corp.test, bot@INTERNAL.test, sue@corp.test")?;
    let values: Vec<&str> = result.detections.iter().map(|d| d.value.as_str()).collect();
    assert_eq!(values, vec!["sue@corp.test"]);
    Ok(())
}

#[test]
fn engine_is_shareable_across_threads() -> Result<()> {
    let engine = std::sync::Arc::new(PiiEngine::new(DetectOptions::default().with_cache(8))?);
    let expected = engine.detect(SCENARIO)?.redacted;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = std::sync::Arc::clone(&engine);
            std::thread::spawn(move || engine.detect(SCENARIO).map(|r| r.redacted))
        })
        .collect();
    for handle in handles {
        let redacted = handle.join().map_err(|_| anyhow::anyhow!("worker panicked"))??;
        assert_eq!(redacted, expected);
    }
    Ok(())
}

#[test]
fn placeholder_shaped_input_survives_restore() -> Result<()> {
    let engine = PiiEngine::with_patterns(
        vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80)],
        plain_options().with_deterministic(false),
    )?;
    let text = "template token [EMAIL_1] then a@x.io";
    let result = engine.detect(text)?;

    assert_eq!(result.detections[0].placeholder, "[EMAIL_2]");
    assert_eq!(result.redacted, "template token [EMAIL_1] then [EMAIL_2]");
    assert_eq!(engine.restore(&result.redacted, &result.redaction_map), text);
    Ok(())
}

#[test]
fn redacting_already_redacted_text_round_trips() -> Result<()> {
    let engine = PiiEngine::with_patterns(vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80)], plain_options())?;
    let issued = engine.detect("a@x.io")?.detections[0].placeholder.clone();

    let text = format!("see {} and a@x.io", issued);
    let result = engine.detect(&text)?;
    assert_ne!(result.detections[0].placeholder, issued);
    assert_eq!(result.redacted.matches(issued.as_str()).count(), 1);
    assert_eq!(engine.restore(&result.redacted, &result.redaction_map), text);

    // The usual token comes back once the input no longer contains it.
    assert_eq!(engine.detect("again a@x.io")?.detections[0].placeholder, issued);
    Ok(())
}

#[test]
fn category_switches_apply_to_programmatic_patterns() -> Result<()> {
    let patterns = || vec![pattern("EMAIL", r"\S+@\S+\.\w+", 80), pattern("TICKET", r"TCK-\d{4}", 60)];
    let text = "mail a@x.io about TCK-1234";

    let mut options = plain_options();
    options.include_emails = false;
    let engine = PiiEngine::with_patterns(patterns(), options)?;
    assert_eq!(engine.pattern_types(), vec!["TICKET"]);
    let result = engine.detect(text)?;
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].pattern_type, "TICKET");

    let engine = PiiEngine::with_patterns(patterns(), plain_options().with_patterns(&["email"]))?;
    assert_eq!(engine.pattern_types(), vec!["EMAIL"]);
    assert_eq!(engine.detect(text)?.detections[0].value, "a@x.io");
    Ok(())
}

struct SharedWhitelist(Arc<Mutex<Vec<String>>>);

impl WhitelistSource for SharedWhitelist {
    fn whitelist(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

#[test]
fn cached_results_follow_whitelist_source_changes() -> Result<()> {
    let terms = Arc::new(Mutex::new(Vec::new()));
    let engine = PiiEngine::builder()
        .options(plain_options().with_cache(8))
        .without_default_catalog()
        .pattern(pattern("EMAIL", r"\S+@\S+\.\w+", 80))
        .whitelist_source(SharedWhitelist(Arc::clone(&terms)))
        .build()?;

    let text = "ping bot@corp.test";
    assert_eq!(engine.detect(text)?.detections.len(), 1);

    terms.lock().push("bot@".to_string());
    assert!(engine.detect(text)?.detections.is_empty());

    terms.lock().clear();
    assert_eq!(engine.detect(text)?.detections.len(), 1);
    Ok(())
}
