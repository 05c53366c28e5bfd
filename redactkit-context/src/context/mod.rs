// redactkit-context/src/context/mod.rs
use daachorse::DoubleArrayAhoCorasick;
extern crate alloc;
use alloc::vec::Vec;
use core::fmt;

pub use daachorse::errors::DaachorseError;

/// Coarse vocabulary families recognised around a candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeywordCategory {
    Technical = 0,
    Business = 1,
    Medical = 2,
    Financial = 3,
    Example = 4,
}

impl KeywordCategory {
    pub const ALL: [KeywordCategory; 5] = [
        KeywordCategory::Technical,
        KeywordCategory::Business,
        KeywordCategory::Medical,
        KeywordCategory::Financial,
        KeywordCategory::Example,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// The built-in lowercase vocabulary for this category.
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            KeywordCategory::Technical => &[
                "function", "class", "method", "endpoint", "server", "database", "config",
                "variable", "debug", "stack", "deploy", "compile", "json", "http", "https",
                "localhost", "sql", "query", "schema", "repository", "commit",
            ],
            KeywordCategory::Business => &[
                "invoice", "customer", "client", "contract", "order", "meeting", "company",
                "department", "employee", "vendor", "supplier", "purchase", "quote",
            ],
            KeywordCategory::Medical => &[
                "patient", "diagnosis", "medical", "hospital", "doctor", "treatment",
                "prescription", "clinic", "health", "nhs", "surgery", "symptoms", "gp",
            ],
            KeywordCategory::Financial => &[
                "bank", "account", "payment", "credit", "debit", "iban", "transaction",
                "salary", "tax", "loan", "insurance", "mortgage", "sort code", "balance",
            ],
            KeywordCategory::Example => &[
                "example", "sample", "test", "testing", "demo", "dummy", "fake",
                "placeholder", "lorem", "ipsum", "mock", "fixture",
            ],
        }
    }
}

/// A small set of [`KeywordCategory`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags(u8);

impl ContextFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, category: KeywordCategory) {
        self.0 |= category.bit();
    }

    pub const fn contains(self, category: KeywordCategory) -> bool {
        self.0 & category.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Bytes that glue a keyword to the token before it (addresses, hosts, paths).
fn joins_before(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@' | b'.' | b'/')
}

fn joins_after(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@')
}

/// Scans a window of text for category keywords with word-boundary awareness.
pub struct ContextScanner {
    automaton: DoubleArrayAhoCorasick<u32>,
}

impl fmt::Debug for ContextScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScanner")
         .field("automaton", &"<DoubleArrayAhoCorasick>")
         .finish()
    }
}

impl ContextScanner {
    /// Builds a scanner over the built-in vocabulary of every category.
    pub fn new() -> Result<Self, DaachorseError> {
        let patvals: Vec<(&str, u32)> = KeywordCategory::ALL
            .iter()
            .flat_map(|category| {
                category
                    .vocabulary()
                    .iter()
                    .map(move |word| (*word, *category as u32))
            })
            .collect();

        let automaton = DoubleArrayAhoCorasick::with_values(patvals)?;
        Ok(Self { automaton })
    }

    /// Returns the categories whose keywords appear as whole words in `window`.
    /// Matching is ASCII case-insensitive.
    pub fn scan(&self, window: &[u8]) -> ContextFlags {
        let lowered = window.to_ascii_lowercase();
        let mut flags = ContextFlags::empty();

        for matched in self.automaton.find_overlapping_iter(&lowered) {
            let m_start = matched.start();
            let m_end = matched.end();

            // "test" must not fire inside "latest", nor "example" inside "john@example.com"
            let prefix_ok = m_start == 0 || !joins_before(lowered[m_start - 1]);
            let suffix_ok = m_end == lowered.len() || !joins_after(lowered[m_end]);

            if prefix_ok && suffix_ok {
                if let Some(category) = KeywordCategory::from_index(matched.value()) {
                    flags.insert(category);
                }
            }
        }
        flags
    }

    /// Scans the text on both sides of `[start, end)` without looking at the value itself.
    pub fn scan_around(&self, text: &[u8], start: usize, end: usize, radius: usize) -> ContextFlags {
        let end = end.min(text.len());
        let start = start.min(end);
        let before = &text[start.saturating_sub(radius)..start];
        let after = &text[end..end.saturating_add(radius).min(text.len())];
        self.scan(before).union(self.scan(after))
    }
}
