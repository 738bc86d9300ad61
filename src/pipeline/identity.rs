//! Identity resolver: deterministic pseudonymous patient identifier (UIN)
//! and readmission detection.
//!
//! The UIN is derived from three independently hashed normalized fields —
//! full name, birth date, region — concatenated in that fixed order. A
//! field that cannot be normalized contributes the all-zero digest, and
//! any zero digest makes the whole UIN undefined.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::{DatabaseError, PatientStore};

use super::classify::hex_encode;
use super::types::is_placeholder;
use super::validators::is_full_name;

/// Digest size per field, in bytes. The UIN concatenates three such
/// digests as hex, giving 96 hex characters total.
pub const FIELD_DIGEST_BYTES: usize = 16;

fn zero_digest() -> String {
    "0".repeat(FIELD_DIGEST_BYTES * 2)
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

/// Birth-date formats accepted for normalization, tried in order.
const BIRTH_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Normalize a full name for hashing: gate on name completeness, then
/// lowercase, strip punctuation, and sort the tokens so that token order
/// never changes the identity ("Иван Петров" ≡ "Петров Иван").
pub fn normalize_full_name(name: &str) -> Option<String> {
    if !is_full_name(name) {
        return None;
    }
    let cleaned = punctuation_re().replace_all(name, "").to_lowercase();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }
    tokens.sort_unstable();
    Some(tokens.join(" "))
}

/// Normalize a birth date to the canonical дд.мм.гггг form. Placeholders
/// and unparsable values are absent.
pub fn normalize_birth_date(date_str: &str) -> Option<String> {
    let date_str = date_str.trim();
    if is_placeholder(date_str) {
        return None;
    }
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .map(|d| d.format("%d.%m.%Y").to_string())
}

/// Normalize the operator-supplied region: lowercase, strip punctuation,
/// collapse whitespace. Empty after cleaning is absent.
pub fn normalize_region(region: &str) -> Option<String> {
    let cleaned = punctuation_re().replace_all(region, "").to_lowercase();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// 16-byte field digest, hex-encoded (SHA-256 truncated to 128 bits).
fn field_digest(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex_encode(&digest[..FIELD_DIGEST_BYTES])
}

/// Per-field digests of the identity triple. Absent fields carry the
/// all-zero digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalHashes {
    pub full_name: String,
    pub birth_date: String,
    pub region: String,
}

/// Hash the identity-relevant fields of a record.
pub fn hash_personal_data(full_name: &str, birth_date: &str, region: &str) -> PersonalHashes {
    let hash_opt = |v: Option<String>| v.map(|s| field_digest(&s)).unwrap_or_else(zero_digest);

    PersonalHashes {
        full_name: hash_opt(normalize_full_name(full_name)),
        birth_date: hash_opt(normalize_birth_date(birth_date)),
        region: hash_opt(normalize_region(region)),
    }
}

/// Concatenate the three digests into the UIN, in fixed field order.
/// None if any digest is the all-zero sentinel.
pub fn generate_uin(hashes: &PersonalHashes) -> Option<String> {
    let zero = zero_digest();
    if hashes.full_name == zero || hashes.birth_date == zero || hashes.region == zero {
        return None;
    }
    Some(format!(
        "{}{}{}",
        hashes.full_name, hashes.birth_date, hashes.region
    ))
}

/// Fresh per-document identifier — unique per document regardless of
/// patient identity.
pub fn generate_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Readmission resolution against the in-run identifier set.
///
/// If the UIN is already known, the current document is a readmission and
/// every previously stored row for that UIN is back-annotated via
/// `set_readmitted`. Otherwise the UIN joins the set so later documents
/// in the same run see it.
pub fn resolve_readmission(
    store: &dyn PatientStore,
    conn: &Connection,
    known_uins: &mut HashSet<String>,
    uin: Option<&str>,
) -> Result<bool, DatabaseError> {
    let Some(uin) = uin else {
        return Ok(false);
    };

    if known_uins.contains(uin) {
        if store.find_by_uin(conn, uin)?.is_some() {
            store.set_readmitted(conn, uin)?;
        }
        return Ok(true);
    }

    known_uins.insert(uin.to_string());
    Ok(false)
}
