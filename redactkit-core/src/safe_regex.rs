//! Bounded regex execution.
//!
//! `exec` and `exec_all` run one pattern against a text under a wall-clock budget and, for
//! `exec_all`, a match-count ceiling. The clock is polled every [`CLOCK_CHECK_INTERVAL`]
//! matches rather than on every iteration, so a single long regex step between polls can
//! still overrun: the budget is a best-effort bound, not preemption.

use std::time::{Duration, Instant};

use crate::errors::RedactError;
use crate::patterns::Pattern;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_MATCHES: usize = 10_000;
/// Number of loop iterations between wall-clock checks.
pub const CLOCK_CHECK_INTERVAL: usize = 10;

/// Execution limits for a single pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    pub timeout: Duration,
    pub max_matches: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

impl ExecLimits {
    pub fn new(timeout_ms: u64, max_matches: usize) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_matches,
        }
    }

    /// These limits with `pattern`'s own time budget applied, if it has one.
    pub fn for_pattern(self, pattern: &Pattern) -> Self {
        match pattern.timeout_ms {
            Some(timeout_ms) => Self {
                timeout: Duration::from_millis(timeout_ms),
                ..self
            },
            None => self,
        }
    }
}

/// One raw regex hit: the full match and, when the pattern has one, its first group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMatch {
    pub start: usize,
    pub end: usize,
    pub group: Option<(usize, usize)>,
}

impl RawMatch {
    /// The reportable range: group 1 when it participated, otherwise the full match.
    pub fn value_range(&self) -> (usize, usize) {
        self.group.unwrap_or((self.start, self.end))
    }
}

fn check_budget(pattern: &Pattern, started: Instant, timeout: Duration) -> Result<(), RedactError> {
    let elapsed = started.elapsed();
    if elapsed > timeout {
        return Err(RedactError::RegexTimeout {
            pattern_type: pattern.pattern_type.clone(),
            timeout_ms: timeout.as_millis() as u64,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }
    Ok(())
}

fn raw_match_at(pattern: &Pattern, text: &str, at: usize) -> Option<RawMatch> {
    let caps = pattern.regex.captures_at(text, at)?;
    let whole = caps.get(0)?;
    let group = caps.get(1).map(|g| (g.start(), g.end()));
    Some(RawMatch {
        start: whole.start(),
        end: whole.end(),
        group,
    })
}

/// Finds the first match of `pattern` in `text`, failing if the search overran `timeout`.
pub fn exec(pattern: &Pattern, text: &str, timeout: Duration) -> Result<Option<RawMatch>, RedactError> {
    let started = Instant::now();
    let found = raw_match_at(pattern, text, 0);
    check_budget(pattern, started, timeout)?;
    Ok(found)
}

/// Finds every non-overlapping match of `pattern` in `text` under `limits`.
///
/// Zero-width matches advance the cursor by one character so the scan always progresses.
pub fn exec_all(pattern: &Pattern, text: &str, limits: ExecLimits) -> Result<Vec<RawMatch>, RedactError> {
    let started = Instant::now();
    let mut matches = Vec::new();
    let mut cursor = 0usize;
    let mut iterations = 0usize;

    while cursor <= text.len() {
        iterations += 1;
        if iterations % CLOCK_CHECK_INTERVAL == 0 {
            check_budget(pattern, started, limits.timeout)?;
        }

        let Some(found) = raw_match_at(pattern, text, cursor) else {
            break;
        };

        if matches.len() >= limits.max_matches {
            return Err(RedactError::RegexMaxMatches {
                pattern_type: pattern.pattern_type.clone(),
                max_matches: limits.max_matches,
            });
        }
        matches.push(found);

        cursor = if found.end > found.start {
            found.end
        } else {
            match text[found.end..].chars().next() {
                Some(c) => found.end + c.len_utf8(),
                None => break,
            }
        };
    }

    check_budget(pattern, started, limits.timeout)?;
    Ok(matches)
}
