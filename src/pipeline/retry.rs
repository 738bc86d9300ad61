//! Validation-driven extraction engine.
//!
//! One document gets up to `max_attempts` model calls. Every attempt is
//! validated in full; a failed attempt feeds its failed checks and missing
//! keys into the next prompt as a corrective suffix. The engine fails open
//! toward storage: when attempts run out, the last parsed record (if any)
//! is still returned alongside its failing report, so the caller can
//! persist both rather than drop the document silently.

use tracing::{debug, warn};

use super::llm::LlmClient;
use super::parser::extract_json;
use super::prompt::build_prompt;
use super::types::{
    is_placeholder, Check, ExtractionRecord, RawDocument, ValidationReport, REQUIRED_KEYS,
};
use super::validators::{
    is_full_name, validate_date, validate_gender, validate_policy, validate_snils_with_floor,
    SNILS_NUMBER_FLOOR,
};

/// Default attempt cap per document.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of the full attempt loop for one document.
#[derive(Debug)]
pub struct ExtractionOutcome {
    /// Last successfully parsed record, accepted or not. None only when no
    /// attempt produced parsable JSON.
    pub record: Option<ExtractionRecord>,
    /// Report of the final attempt.
    pub report: ValidationReport,
    pub accepted: bool,
    pub attempts: u32,
}

pub struct ExtractionEngine<'a> {
    llm: &'a dyn LlmClient,
    max_attempts: u32,
    snils_floor: u64,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(llm: &'a dyn LlmClient, max_attempts: u32, snils_floor: u64) -> Self {
        Self {
            llm,
            max_attempts,
            snils_floor,
        }
    }

    /// Run the attempt loop for one document.
    pub fn extract(&self, document: &RawDocument) -> ExtractionOutcome {
        let mut record: Option<ExtractionRecord> = None;
        let mut report = unparsable_report();
        let mut attempts = 0;

        while attempts < self.max_attempts {
            let previous = if attempts == 0 {
                None
            } else {
                Some((report.failed(), report.missing_keys().to_vec()))
            };
            let prompt = build_prompt(
                document.format,
                &document.content,
                previous.as_ref().map(|(f, m)| (f.as_slice(), m.as_slice())),
            );
            attempts += 1;

            // A failed call or unparsable response must not clobber the
            // report of an earlier parsed attempt: on exhaustion the last
            // parsed record stays paired with its own validation failures
            let response = match self.llm.generate(&prompt) {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Model call failed");
                    if record.is_none() {
                        report = unparsable_report();
                    }
                    continue;
                }
            };

            let Some(value) = extract_json(&response) else {
                warn!(attempt = attempts, "No JSON object in model response");
                if record.is_none() {
                    report = unparsable_report();
                }
                continue;
            };

            let (parsed, missing) = ExtractionRecord::from_value(&value);
            report = validate_record(&parsed, missing, self.snils_floor);
            record = Some(parsed);

            if report.accepted() {
                debug!(attempt = attempts, "Extraction accepted");
                return ExtractionOutcome {
                    record,
                    report,
                    accepted: true,
                    attempts,
                };
            }
            debug!(
                attempt = attempts,
                failed = ?report.failed().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                "Attempt rejected"
            );
        }

        ExtractionOutcome {
            record,
            report,
            accepted: false,
            attempts,
        }
    }
}

/// Validate one parsed record against every field check. The structural
/// checks (epicrisis classification, supported format) are decided before
/// the engine runs and are recorded as passed here.
pub fn validate_record(
    record: &ExtractionRecord,
    missing: Vec<String>,
    snils_floor: u64,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.set(Check::IsEpicrisis, true);
    report.set(Check::SupportedFormat, true);
    report.set_missing_keys(missing);

    report.set(Check::FullName, is_full_name(&record.full_name));
    report.set(Check::Sex, validate_gender(&record.sex));
    report.set(Check::BirthDate, validate_date(&record.birth_date));
    report.set(Check::Address, !is_placeholder(&record.address));
    report.set(
        Check::Snils,
        validate_snils_with_floor(&record.snils, snils_floor),
    );
    report.set(Check::PolicyNumber, validate_policy(&record.policy_number));
    report.set(Check::Hospital, !is_placeholder(&record.hospital));
    report.set(Check::AdmissionDate, validate_date(&record.admission_date));
    report.set(Check::DischargeDate, validate_date(&record.discharge_date));
    report.set(Check::DeathDate, validate_date(&record.death_date));
    report
}

/// Report for attempts that produced nothing parsable: every required key
/// counts as missing so the corrective prompt names all of them.
fn unparsable_report() -> ValidationReport {
    let mut report = ValidationReport::new();
    report.set(Check::IsEpicrisis, true);
    report.set(Check::SupportedFormat, true);
    report.set_missing_keys(REQUIRED_KEYS.iter().map(|k| k.to_string()).collect());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::types::SourceFormat;

    fn valid_json() -> String {
        serde_json::json!({
            "ФИО": "Иванов Иван Иванович",
            "Пол пациента": "м",
            "Дата рождения": "03.12.1954",
            "Адрес": "г. Москва, ул. Ленина, д. 1",
            "Номер СНИЛС": "112-233-445 95",
            "Номер полиса ОМС": "123456789012345678901",
            "Название больницы": "ГКБ №1",
            "Дата госпитализации": "01.02.2020",
            "Дата выписки": "10.02.2020",
            "Дата смерти": "10.02.2020",
        })
        .to_string()
    }

    fn document() -> RawDocument {
        RawDocument::new("Выписной эпикриз...".to_string(), SourceFormat::Txt)
    }

    #[test]
    fn accepts_on_first_valid_attempt() {
        let client = MockLlmClient::new(&valid_json());
        let engine = ExtractionEngine::new(&client, DEFAULT_MAX_ATTEMPTS, SNILS_NUMBER_FLOOR);
        let outcome = engine.extract(&document());
        assert!(outcome.accepted);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(client.call_count(), 1);
        assert_eq!(outcome.record.unwrap().full_name, "Иванов Иван Иванович");
    }

    #[test]
    fn retries_until_valid_response() {
        let client = MockLlmClient::with_sequence(vec![
            Ok("мусор без JSON".into()),
            Ok(valid_json()),
        ]);
        let engine = ExtractionEngine::new(&client, DEFAULT_MAX_ATTEMPTS, SNILS_NUMBER_FLOOR);
        let outcome = engine.extract(&document());
        assert!(outcome.accepted);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn exhausts_attempts_and_keeps_last_record() {
        let bad = serde_json::json!({
            "ФИО": "Иванов",
            "Пол пациента": "м",
        })
        .to_string();
        let client = MockLlmClient::new(&bad);
        let engine = ExtractionEngine::new(&client, DEFAULT_MAX_ATTEMPTS, SNILS_NUMBER_FLOOR);
        let outcome = engine.extract(&document());
        assert!(!outcome.accepted);
        assert_eq!(outcome.attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(client.call_count(), DEFAULT_MAX_ATTEMPTS);
        // Fail open: the rejected record is still available for storage
        assert_eq!(outcome.record.unwrap().full_name, "Иванов");
        assert!(outcome.report.failed().contains(&Check::FullName));
        assert!(!outcome.report.missing_keys().is_empty());
    }

    #[test]
    fn model_errors_consume_attempts_without_record() {
        let client = MockLlmClient::failing();
        let engine = ExtractionEngine::new(&client, DEFAULT_MAX_ATTEMPTS, SNILS_NUMBER_FLOOR);
        let outcome = engine.extract(&document());
        assert!(!outcome.accepted);
        assert!(outcome.record.is_none());
        assert_eq!(outcome.attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(
            outcome.report.missing_keys().len(),
            REQUIRED_KEYS.len()
        );
    }

    #[test]
    fn exhausted_report_stays_with_last_parsed_record() {
        // Attempt 1 parses but fails validation; attempts 2 and 3 die on
        // transport. The outcome must carry attempt 1's real failures,
        // not a fabricated all-keys-missing report.
        let bad = serde_json::json!({
            "ФИО": "Иванов",
            "Пол пациента": "м",
        })
        .to_string();
        let client = MockLlmClient::with_sequence(vec![
            Ok(bad),
            Err("connection reset".into()),
            Err("connection reset".into()),
        ]);
        let engine = ExtractionEngine::new(&client, DEFAULT_MAX_ATTEMPTS, SNILS_NUMBER_FLOOR);
        let outcome = engine.extract(&document());
        assert!(!outcome.accepted);
        assert_eq!(outcome.attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(outcome.record.unwrap().full_name, "Иванов");
        assert!(outcome.report.failed().contains(&Check::FullName));
        // The real record had its name key present
        assert!(!outcome
            .report
            .missing_keys()
            .contains(&"ФИО".to_string()));
    }

    #[test]
    fn snils_floor_flows_into_validation() {
        // Floor above the extracted body: the otherwise valid number is
        // rejected as a service number
        let client = MockLlmClient::new(&valid_json());
        let engine = ExtractionEngine::new(&client, 1, 999_999_999);
        let outcome = engine.extract(&document());
        assert!(!outcome.accepted);
        assert_eq!(outcome.report.failed(), vec![Check::Snils]);
    }

    #[test]
    fn accepted_response_inside_markdown_fences() {
        let fenced = format!("```json\n{}\n```", valid_json());
        let client = MockLlmClient::new(&fenced);
        let engine = ExtractionEngine::new(&client, 1, SNILS_NUMBER_FLOOR);
        assert!(engine.extract(&document()).accepted);
    }

    #[test]
    fn validate_record_flags_each_bad_field() {
        let value = serde_json::json!({
            "ФИО": "Иванов Иван Иванович",
            "Пол пациента": "неизвестно",
            "Дата рождения": "третье декабря",
            "Адрес": "не указано",
            "Номер СНИЛС": "112-233-445 00",
            "Номер полиса ОМС": "123",
            "Название больницы": "ГКБ №1",
            "Дата госпитализации": "01.02.2020",
            "Дата выписки": "10.02.2020",
            "Дата смерти": "не указано",
        });
        let (record, missing) = ExtractionRecord::from_value(&value);
        let report = validate_record(&record, missing, SNILS_NUMBER_FLOOR);
        let failed = report.failed();
        for check in [
            Check::Sex,
            Check::BirthDate,
            Check::Address,
            Check::Snils,
            Check::PolicyNumber,
            Check::DeathDate,
        ] {
            assert!(failed.contains(&check), "{check} should have failed");
        }
        assert!(!failed.contains(&Check::FullName));
        assert!(!failed.contains(&Check::Hospital));
    }

    #[test]
    fn death_date_is_validated_like_any_date() {
        // A discharge epicrisis has no death date; the check fails and the
        // document is stored with its failing report rather than accepted
        let value: serde_json::Value = serde_json::from_str(&valid_json()).unwrap();
        let (mut record, missing) = ExtractionRecord::from_value(&value);
        record.death_date = "не указано".into();
        let report = validate_record(&record, missing, SNILS_NUMBER_FLOOR);
        assert!(!report.accepted());
        assert_eq!(report.failed(), vec![Check::DeathDate]);
    }
}
