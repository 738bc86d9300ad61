//! Prompt templates for the extraction model.
//!
//! One template per source format (text layout differs enough between
//! PDF dumps, plain text and RTF conversions to warrant separate wording),
//! plus the corrective suffix appended on retry attempts.

use super::types::{Check, SourceFormat};

const PROMPT_COMMON: &str = "\
Ты — система извлечения структурированных данных из медицинских выписных \
и посмертных эпикризов. Извлеки из документа ровно следующие поля и верни \
ОДИН JSON-объект без пояснений и без обёртки из markdown:

{
  \"ФИО\": \"...\",
  \"Пол пациента\": \"...\",
  \"Дата рождения\": \"...\",
  \"Адрес\": \"...\",
  \"Номер СНИЛС\": \"...\",
  \"Номер полиса ОМС\": \"...\",
  \"Название больницы\": \"...\",
  \"Дата госпитализации\": \"...\",
  \"Дата выписки\": \"...\",
  \"Дата смерти\": \"...\"
}

Требования к формату:
- все даты — строго ДД.ММ.ГГГГ;
- ФИО — полностью, без инициалов;
- пол — \"м\" или \"ж\";
- СНИЛС — 11 цифр, полис ОМС — 21 цифра;
- если значение в документе отсутствует, поставь \"не указано\".";

const PROMPT_PDF_HINT: &str = "\
Текст получен из PDF: возможны артефакты постраничной разбивки, таблицы, \
разорванные переносами слова. Склеивай значения, разнесённые по строкам.";

const PROMPT_TXT_HINT: &str = "\
Текст получен из обычного текстового файла. Поля могут идти сплошным \
текстом без разметки.";

const PROMPT_RTF_HINT: &str = "\
Текст получен конвертацией из RTF: возможны остаточные артефакты \
форматирования. Игнорируй их.";

/// Base prompt for the given source format.
pub fn base_prompt(format: SourceFormat) -> String {
    let hint = match format {
        SourceFormat::Pdf => PROMPT_PDF_HINT,
        SourceFormat::Txt => PROMPT_TXT_HINT,
        SourceFormat::Rtf => PROMPT_RTF_HINT,
    };
    format!("{PROMPT_COMMON}\n\n{hint}")
}

/// Corrective suffix for attempts after the first, naming the fields that
/// failed validation in the previous attempt.
pub fn corrective_suffix(failed: &[Check], missing_keys: &[String]) -> String {
    let mut suffix = String::from(
        "\n\nВАЖНО: Предыдущий ответ содержал ошибки. \
         Убедитесь, что все поля заполнены корректно и полностью. \
         Особое внимание уделите формату: даты (ДД.ММ.ГГГГ), ФИО (полностью), СНИЛС, ОМС. ",
    );

    if !missing_keys.is_empty() {
        suffix.push_str(&format!(
            "Особенно важно заполнить следующие поля: {}. ",
            missing_keys.join(", ")
        ));
    } else if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|c| c.as_str()).collect();
        suffix.push_str(&format!(
            "В прошлый раз не прошли проверку: {}. ",
            names.join(", ")
        ));
    }

    suffix.push_str("Не возвращайте неполные данные, инициалы или заглушки вроде 'Не указано'.");
    suffix
}

/// Full prompt: template (+ corrective suffix on retries) with the
/// document text wrapped in `<DOCUMENT>` tags.
pub fn build_prompt(
    format: SourceFormat,
    document_text: &str,
    previous_failures: Option<(&[Check], &[String])>,
) -> String {
    let mut prompt = base_prompt(format);
    if let Some((failed, missing)) = previous_failures {
        prompt.push_str(&corrective_suffix(failed, missing));
    }
    format!("{prompt}\n\n<DOCUMENT>\n{document_text}\n</DOCUMENT>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_corrective_suffix() {
        let prompt = build_prompt(SourceFormat::Txt, "текст", None);
        assert!(prompt.contains("<DOCUMENT>\nтекст\n</DOCUMENT>"));
        assert!(!prompt.contains("Предыдущий ответ"));
    }

    #[test]
    fn retry_names_failed_checks() {
        let failed = vec![Check::Snils, Check::BirthDate];
        let prompt = build_prompt(SourceFormat::Pdf, "текст", Some((&failed, &[])));
        assert!(prompt.contains("Предыдущий ответ содержал ошибки"));
        assert!(prompt.contains("Номер СНИЛС"));
        assert!(prompt.contains("Дата рождения"));
    }

    #[test]
    fn retry_prefers_missing_keys() {
        let missing = vec!["Адрес".to_string()];
        let prompt = build_prompt(SourceFormat::Rtf, "текст", Some((&[], &missing)));
        assert!(prompt.contains("Особенно важно заполнить следующие поля: Адрес"));
    }

    #[test]
    fn templates_differ_per_format() {
        let pdf = base_prompt(SourceFormat::Pdf);
        let txt = base_prompt(SourceFormat::Txt);
        let rtf = base_prompt(SourceFormat::Rtf);
        assert_ne!(pdf, txt);
        assert_ne!(txt, rtf);
        for p in [&pdf, &txt, &rtf] {
            assert!(p.contains("\"ФИО\""));
            assert!(p.contains("\"Дата смерти\""));
        }
    }
}
