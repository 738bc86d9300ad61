//! Core types for the de-identification pipeline.
//!
//! These model the full lifecycle:
//! RawDocument → ExtractionRecord → ValidationReport → PatientRecord.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sentinel for fields the model could not find. Fields are never absent
/// in a finalized record — unknown values carry this marker instead.
pub const NOT_SPECIFIED: &str = "не указано";

/// Placeholder spellings treated as "no value" wherever a real value is
/// required (dates, policy numbers, regions).
pub const PLACEHOLDERS: &[&str] = &[
    "не указано",
    "отсутствует",
    "нет",
    "n/a",
    "-",
    "—",
    "null",
    "none",
    "",
];

/// Returns true if the trimmed, lowercased value is a known placeholder.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    PLACEHOLDERS.iter().any(|p| *p == v)
}

// ═══════════════════════════════════════════
// Source format
// ═══════════════════════════════════════════

/// Container format the source text was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    Txt,
    Rtf,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "rtf" => Some(Self::Rtf),
            _ => None,
        }
    }

    pub fn as_ext(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Txt => ".txt",
            Self::Rtf => ".rtf",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ext())
    }
}

// ═══════════════════════════════════════════
// Raw document
// ═══════════════════════════════════════════

/// A document as read from the input folder. Ephemeral — only its content
/// hash outlives processing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub content: String,
    pub format: SourceFormat,
    pub content_hash: String,
}

impl RawDocument {
    pub fn new(content: String, format: SourceFormat) -> Self {
        let content_hash = crate::pipeline::classify::content_hash(&content);
        Self {
            content,
            format,
            content_hash,
        }
    }
}

// ═══════════════════════════════════════════
// Extraction record
// ═══════════════════════════════════════════

/// The ten required JSON keys the model is prompted for, in the fixed
/// field order used throughout the pipeline.
pub const REQUIRED_KEYS: &[&str] = &[
    "ФИО",
    "Пол пациента",
    "Дата рождения",
    "Адрес",
    "Номер СНИЛС",
    "Номер полиса ОМС",
    "Название больницы",
    "Дата госпитализации",
    "Дата выписки",
    "Дата смерти",
];

/// Structured fields extracted by the model from one document.
///
/// Built from the model's JSON with per-key presence tracking; keys the
/// model omitted get [`NOT_SPECIFIED`]. Serializes with the Russian keys
/// the model is prompted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(rename = "ФИО")]
    pub full_name: String,
    #[serde(rename = "Пол пациента")]
    pub sex: String,
    #[serde(rename = "Дата рождения")]
    pub birth_date: String,
    #[serde(rename = "Адрес")]
    pub address: String,
    #[serde(rename = "Номер СНИЛС")]
    pub snils: String,
    #[serde(rename = "Номер полиса ОМС")]
    pub policy_number: String,
    #[serde(rename = "Название больницы")]
    pub hospital: String,
    #[serde(rename = "Дата госпитализации")]
    pub admission_date: String,
    #[serde(rename = "Дата выписки")]
    pub discharge_date: String,
    #[serde(rename = "Дата смерти")]
    pub death_date: String,
}

impl ExtractionRecord {
    /// Build a record from the model's parsed JSON object, tracking which
    /// required keys were missing. Non-string values are stringified;
    /// missing keys get the sentinel.
    pub fn from_value(value: &serde_json::Value) -> (Self, Vec<String>) {
        let get = |key: &str| -> Option<String> {
            value.get(key).map(|v| match v {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Null => NOT_SPECIFIED.to_string(),
                other => other.to_string(),
            })
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|k| value.get(**k).is_none())
            .map(|k| k.to_string())
            .collect();

        let field = |key: &str| get(key).unwrap_or_else(|| NOT_SPECIFIED.to_string());

        let record = Self {
            full_name: field("ФИО"),
            sex: field("Пол пациента"),
            birth_date: field("Дата рождения"),
            address: field("Адрес"),
            snils: field("Номер СНИЛС"),
            policy_number: field("Номер полиса ОМС"),
            hospital: field("Название больницы"),
            admission_date: field("Дата госпитализации"),
            discharge_date: field("Дата выписки"),
            death_date: field("Дата смерти"),
        };

        (record, missing)
    }
}

// ═══════════════════════════════════════════
// Validation report
// ═══════════════════════════════════════════

/// Every check the retry engine runs per attempt: two structural flags,
/// the all-keys presence check, and one entry per extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    IsEpicrisis,
    SupportedFormat,
    AllKeys,
    FullName,
    Sex,
    BirthDate,
    Address,
    Snils,
    PolicyNumber,
    Hospital,
    AdmissionDate,
    DischargeDate,
    DeathDate,
}

impl Check {
    /// Label used in persisted error reports and corrective prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsEpicrisis => "Документ эпикриз",
            Self::SupportedFormat => "Верный формат файла",
            Self::AllKeys => "Все ключи",
            Self::FullName => "ФИО",
            Self::Sex => "Пол пациента",
            Self::BirthDate => "Дата рождения",
            Self::Address => "Адрес",
            Self::Snils => "Номер СНИЛС",
            Self::PolicyNumber => "Номер полиса ОМС",
            Self::Hospital => "Название больницы",
            Self::AdmissionDate => "Дата госпитализации",
            Self::DischargeDate => "Дата выписки",
            Self::DeathDate => "Дата смерти",
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-attempt validation verdict. Always recomputed fresh; a document is
/// accepted iff every entry is true.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    entries: Vec<(Check, bool)>,
    missing_keys: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, check: Check, ok: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|(c, _)| *c == check) {
            entry.1 = ok;
        } else {
            self.entries.push((check, ok));
        }
    }

    pub fn set_missing_keys(&mut self, missing: Vec<String>) {
        self.set(Check::AllKeys, missing.is_empty());
        self.missing_keys = missing;
    }

    pub fn missing_keys(&self) -> &[String] {
        &self.missing_keys
    }

    /// True iff every recorded check passed.
    pub fn accepted(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|(_, ok)| *ok)
    }

    /// Checks that failed, in recording order.
    pub fn failed(&self) -> Vec<Check> {
        self.entries
            .iter()
            .filter(|(_, ok)| !*ok)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Serialize for the error log: one boolean per check label.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (check, ok) in &self.entries {
            map.insert(check.as_str().to_string(), serde_json::Value::Bool(*ok));
        }
        if !self.missing_keys.is_empty() {
            map.insert(
                "Отсутствующие ключи".to_string(),
                serde_json::json!(self.missing_keys),
            );
        }
        serde_json::Value::Object(map)
    }
}

// ═══════════════════════════════════════════
// Patient record
// ═══════════════════════════════════════════

/// Final per-document record written to the store: extracted fields plus
/// the derived attributes. `document_id` is always a fresh UUID; `uin` is
/// stable per patient and None when name/birth date/region could not be
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub uin: Option<String>,
    pub document_id: String,
    pub fields: ExtractionRecord,
    pub region: String,
    pub age_at_admission: String,
    pub readmission: bool,
}

/// Marker stored when the age can be neither read nor computed.
pub const AGE_UNKNOWN: &str = "Данные отсутствуют";

/// Age at admission: admission date minus birth date (both дд.мм.гггг),
/// [`AGE_UNKNOWN`] when either date does not parse.
pub fn compute_age(birth_date: &str, admission_date: &str) -> String {
    let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%d.%m.%Y").ok();
    if let (Some(birth), Some(admission)) = (parse(birth_date), parse(admission_date)) {
        let mut age = admission.year() - birth.year();
        if (admission.month(), admission.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        return age.to_string();
    }

    AGE_UNKNOWN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension(".PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("txt"), Some(SourceFormat::Txt));
        assert_eq!(SourceFormat::from_extension(".doc"), None);
    }

    #[test]
    fn record_from_value_fills_sentinels_and_tracks_missing() {
        let value = serde_json::json!({
            "ФИО": "Иванов Иван Иванович",
            "Пол пациента": "м",
        });
        let (record, missing) = ExtractionRecord::from_value(&value);
        assert_eq!(record.full_name, "Иванов Иван Иванович");
        assert_eq!(record.birth_date, NOT_SPECIFIED);
        assert_eq!(missing.len(), 8);
        assert!(missing.contains(&"Дата рождения".to_string()));
    }

    #[test]
    fn record_from_value_complete() {
        let value = serde_json::json!({
            "ФИО": "Иванов Иван",
            "Пол пациента": "м",
            "Дата рождения": "01.01.1960",
            "Адрес": "г. Москва",
            "Номер СНИЛС": "112-233-445 95",
            "Номер полиса ОМС": "123456789012345678901",
            "Название больницы": "ГКБ №1",
            "Дата госпитализации": "10.02.2024",
            "Дата выписки": "20.02.2024",
            "Дата смерти": null,
        });
        let (record, missing) = ExtractionRecord::from_value(&value);
        assert!(missing.is_empty());
        assert_eq!(record.death_date, NOT_SPECIFIED);
    }

    #[test]
    fn report_accepted_only_when_all_pass() {
        let mut report = ValidationReport::new();
        report.set(Check::IsEpicrisis, true);
        report.set(Check::FullName, true);
        assert!(report.accepted());
        report.set(Check::Snils, false);
        assert!(!report.accepted());
        assert_eq!(report.failed(), vec![Check::Snils]);
    }

    #[test]
    fn empty_report_is_not_accepted() {
        assert!(!ValidationReport::new().accepted());
    }

    #[test]
    fn report_set_overwrites_existing_entry() {
        let mut report = ValidationReport::new();
        report.set(Check::Sex, false);
        report.set(Check::Sex, true);
        assert!(report.accepted());
    }

    #[test]
    fn report_serializes_with_russian_labels() {
        let mut report = ValidationReport::new();
        report.set(Check::IsEpicrisis, true);
        report.set(Check::Snils, false);
        let json = report.to_json();
        assert_eq!(json["Документ эпикриз"], serde_json::json!(true));
        assert_eq!(json["Номер СНИЛС"], serde_json::json!(false));
    }

    #[test]
    fn age_computed_from_dates() {
        assert_eq!(compute_age("03.12.1954", "01.02.2020"), "65");
        // Birthday not yet reached in the admission year
        assert_eq!(compute_age("03.12.1954", "01.12.2020"), "65");
        assert_eq!(compute_age("03.12.1954", "03.12.2020"), "66");
    }

    #[test]
    fn age_unknown_when_dates_unparsable() {
        assert_eq!(compute_age("не указано", "01.01.2020"), AGE_UNKNOWN);
        assert_eq!(compute_age("03.12.1954", ""), AGE_UNKNOWN);
    }
}
