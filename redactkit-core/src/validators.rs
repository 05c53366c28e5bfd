// File: redactkit-core/src/validators.rs
//! Semantic validators for specific PII types.
//!
//! A regex only proves a value has the right shape. These checks reject shapes that cannot
//! be real identifiers (reserved SSN areas, bad NINO prefixes, failed checksums) and are
//! referenced by name from catalogue rules.
//!
//! License: MIT OR APACHE 2.0

use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use crate::patterns::Validator;

/// Resolves a built-in validator by the name used in catalogue files.
pub fn named_validator(name: &str) -> Option<Arc<dyn Validator>> {
    let validator: Arc<dyn Validator> = match name {
        "us_ssn" => Arc::new(|value: &str, _ctx: &str| is_valid_ssn(value)),
        "uk_nino" => Arc::new(|value: &str, _ctx: &str| is_valid_uk_nino(value)),
        "luhn" => Arc::new(|value: &str, _ctx: &str| is_valid_credit_card(value)),
        "nhs_number" => Arc::new(|value: &str, _ctx: &str| is_valid_nhs_number(value)),
        "iban" => Arc::new(|value: &str, _ctx: &str| is_valid_iban(value)),
        _ => return None,
    };
    Some(validator)
}

/// Names accepted by [`named_validator`].
pub const VALIDATOR_NAMES: [&str; 5] = ["us_ssn", "uk_nino", "luhn", "nhs_number", "iban"];

/// Validates a US SSN ("XXX-XX-XXXX") against the SSA's never-issued ranges.
pub fn is_valid_ssn(ssn: &str) -> bool {
    let mut parts = ssn.split('-');
    let (Some(area), Some(group), Some(serial), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if area.len() != 3 || group.len() != 2 || serial.len() != 4 {
        return false;
    }
    let (Ok(area), Ok(group), Ok(serial)) = (area.parse::<u16>(), group.parse::<u8>(), serial.parse::<u16>()) else {
        return false;
    };

    let invalid_area = area == 0 || area == 666 || area >= 900;
    !(invalid_area || group == 0 || serial == 0)
}

static INVALID_NINO_PREFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["BG", "GB", "KN", "NK", "NT", "TN", "ZZ"].into_iter().collect());

static INVALID_NINO_FIRST_CHARS: Lazy<HashSet<char>> =
    Lazy::new(|| ['D', 'F', 'I', 'Q', 'U', 'V'].into_iter().collect());

static INVALID_NINO_SECOND_CHARS: Lazy<HashSet<char>> =
    Lazy::new(|| ['D', 'F', 'I', 'O', 'Q', 'U', 'V'].into_iter().collect());

/// Validates a UK National Insurance number ("AA123456A", spaces allowed) against HMRC's
/// prefix and suffix rules.
pub fn is_valid_uk_nino(nino: &str) -> bool {
    let normalized: Cow<str> = if nino.chars().any(|c| c.is_ascii_lowercase() || c.is_whitespace()) {
        Cow::Owned(nino.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase())
    } else {
        Cow::Borrowed(nino)
    };

    let chars: Vec<char> = normalized.chars().collect();
    let [first, second, d1, d2, d3, d4, d5, d6, suffix] = chars.as_slice() else {
        return false;
    };

    if !first.is_ascii_alphabetic() || !second.is_ascii_alphabetic() {
        return false;
    }
    if INVALID_NINO_FIRST_CHARS.contains(first) || INVALID_NINO_SECOND_CHARS.contains(second) {
        return false;
    }
    if INVALID_NINO_PREFIXES.contains(&normalized[0..2]) {
        return false;
    }
    if ![d1, d2, d3, d4, d5, d6].iter().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(suffix, 'A'..='D')
}

/// Mod-10 (Luhn) checksum over a string of ASCII digits.
pub fn is_valid_luhn(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else { return false; };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Luhn-checks a card number after stripping separators. Lengths outside 13..=19 fail.
pub fn is_valid_credit_card(cc_number: &str) -> bool {
    let digits: String = cc_number.chars().filter(|c| c.is_ascii_digit()).collect();
    (13..=19).contains(&digits.len()) && is_valid_luhn(&digits)
}

/// Mod-11 check digit used by NHS numbers ("943 476 5919").
pub fn is_valid_nhs_number(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 10 {
        return false;
    }
    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    let check = 11 - (sum % 11);
    match check {
        11 => digits[9] == 0,
        10 => false,
        c => digits[9] == c,
    }
}

/// ISO 13616 mod-97 check for an IBAN (spaces allowed).
pub fn is_valid_iban(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < 15 || compact.len() > 34 || !compact.is_ascii() {
        return false;
    }
    let (head, tail) = compact.split_at(4);
    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            _ => return false,
        };
        // Letters expand to two decimal digits.
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}
