//! Parsing of raw model responses into JSON.
//!
//! The model wraps its JSON in code fences, quotes, or surrounding prose
//! often enough that strict parsing would burn retry attempts for nothing.
//! Strip the wrappers, cut the outermost brace-delimited substring, and
//! only then hand the result to serde. Parse failure is a per-attempt
//! error, never a panic.

use std::sync::OnceLock;

use regex::Regex;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*```json\s*|\s*```\s*$").expect("static regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Strip ```json fences, outer quotes, and collapse whitespace runs.
pub fn clean_json_string(content: &str) -> String {
    let without_fences = fence_re().replace_all(content, "");
    let trimmed = without_fences
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    whitespace_re().replace_all(trimmed, " ").into_owned()
}

/// Extract a JSON object from a model response.
///
/// Tolerates fenced blocks, prose before/after the object, and stray
/// outer quotes. Returns None when no parseable object is present.
pub fn extract_json(content: &str) -> Option<serde_json::Value> {
    let clean = clean_json_string(content);

    let start = clean.find('{')?;
    let end = clean.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str(&clean[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse JSON from model response");
            None
        }
    }
}
