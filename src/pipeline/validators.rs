//! Field validators: pure, stateless predicates over model-extracted
//! values. Each is total over its input — arbitrary garbage returns false,
//! never an error.

use chrono::NaiveDate;

use super::types::is_placeholder;

/// Date formats accepted by [`validate_date`], tried in order.
/// ISO year-month (no day) is handled separately below.
const DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y",
    "%d.%m.%y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Returns true if the string parses under any of the accepted date
/// formats (day.month.year with 2- or 4-digit year, ISO date, ISO
/// year-month, slash-separated d/m/y and m/d/y, English long forms).
pub fn validate_date(date_str: &str) -> bool {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return false;
    }

    if DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(date_str, fmt).is_ok())
    {
        return true;
    }

    // ISO year-month: chrono refuses to parse a date without a day, so
    // pin the first of the month and re-check.
    if let Some((year, month)) = date_str.split_once('-') {
        if year.len() == 4
            && (1..=2).contains(&month.len())
            && year.chars().all(|c| c.is_ascii_digit())
            && month.chars().all(|c| c.is_ascii_digit())
        {
            return NaiveDate::parse_from_str(&format!("{date_str}-01"), "%Y-%m-%d").is_ok();
        }
    }

    false
}

/// Accepted gender spellings: Russian and English, full and abbreviated.
pub fn validate_gender(gender: &str) -> bool {
    matches!(
        gender.trim().to_lowercase().as_str(),
        "м" | "ж" | "муж" | "жен" | "мужской" | "женский" | "m" | "f"
    )
}

/// A name is "full" when at least two whitespace tokens are longer than
/// one character after stripping periods, hyphens and apostrophes —
/// initials-only and single-word names are rejected.
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace()
        .filter(|part| {
            part.chars()
                .filter(|c| !matches!(c, '.' | '-' | '\''))
                .count()
                > 1
        })
        .count()
        >= 2
}

/// SNILS numbers with a 9-digit body at or below this value are service
/// numbers, not personal ones.
pub const SNILS_NUMBER_FLOOR: u64 = 1_001_998;

/// Validate a SNILS (national insurance number):
/// - exactly 11 digits after stripping separators;
/// - body (first 9 digits) greater than [`SNILS_NUMBER_FLOOR`];
/// - no three identical consecutive digits anywhere in the 11;
/// - weighted checksum (weights 9..1) over the body matches the last two
///   digits, with the standard <100 / 100,101 / mod-101 reduction.
pub fn validate_snils(snils: &str) -> bool {
    validate_snils_with_floor(snils, SNILS_NUMBER_FLOOR)
}

pub fn validate_snils_with_floor(snils: &str, floor: u64) -> bool {
    let digits: Vec<u32> = snils.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 {
        return false;
    }

    let number: u64 = digits[..9].iter().fold(0u64, |acc, d| acc * 10 + *d as u64);
    if number <= floor {
        return false;
    }

    if digits.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
        return false;
    }

    let control = digits[9] * 10 + digits[10];
    let total: u32 = digits[..9]
        .iter()
        .zip((1..=9).rev())
        .map(|(d, weight)| d * weight)
        .sum();

    let expected = match total {
        0..=99 => total,
        100 | 101 => 0,
        _ => {
            let rem = total % 101;
            if rem >= 100 {
                0
            } else {
                rem
            }
        }
    };

    control == expected
}

/// Validate an OMS policy number (new form): not a placeholder, exactly
/// 21 digits after stripping separators, not a degenerate run of one
/// repeated digit.
pub fn validate_policy(policy: &str) -> bool {
    if is_placeholder(policy) {
        return false;
    }

    let digits: String = policy.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 21 {
        return false;
    }

    let first = digits.as_bytes()[0];
    if digits.bytes().all(|b| b == first) {
        return false;
    }

    true
}
