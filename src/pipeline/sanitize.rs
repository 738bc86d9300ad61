//! Document sanitizer: removes every discovered personal value — and its
//! probable surface forms — from the source text.
//!
//! The working set of removal targets is expanded from the extracted
//! fields (name inflections, date spellings, ID formatting variants,
//! address n-grams) and erased longest-first with word-boundary-anchored,
//! case-insensitive matching, so a longer phrase is never partially
//! destroyed by one of its own substrings. Generic address patterns are
//! applied in a second, global pass regardless of what the model found.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::morphology::MorphAnalyzer;
use super::types::{ExtractionRecord, SourceFormat};

/// Month names in the genitive case, for "3 декабря 1954"-style spellings.
const MONTHS_GENITIVE: &[&str] = &[
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Suffixes a birth date appears with in running text.
const DATE_SUFFIXES: &[&str] = &["г.", " г.", " года", "года", "года.", "г", " г", " года."];

/// Format-level address patterns, applied globally in the second pass.
const ADDRESS_PATTERNS: &[&str] = &[
    r"(?i)д\.\s*\d+",
    r"(?i)кв\.\s*\d+",
    r"(?i)[а-яё]+(?:ая|яя)\s+область",
    r"(?i)[а-яё]+(?:ый|ий)\s+район",
    r"(?i)город\s+[а-яё]+",
    r"(?i)село\s+[а-яё]+",
    r"(?i)пос[её]лок\s+[а-яё]+",
    r"(?i)ул\.\s*[а-яё]+",
    r"(?i)улица\s+[а-яё]+",
];

fn address_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        ADDRESS_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("static regex"))
            .collect()
    })
}

fn address_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[а-яА-ЯёЁa-zA-Z0-9]+").expect("static regex"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sanitizer over one morphological analyzer instance.
pub struct DocumentSanitizer<'a> {
    morph: &'a dyn MorphAnalyzer,
}

impl<'a> DocumentSanitizer<'a> {
    pub fn new(morph: &'a dyn MorphAnalyzer) -> Self {
        Self { morph }
    }

    /// Expand the sensitive fields of a record into the set of literal
    /// strings to erase.
    pub fn removal_targets(&self, record: &ExtractionRecord) -> HashSet<String> {
        let mut targets = HashSet::new();

        self.add_name_targets(&mut targets, &record.full_name);
        self.add_birth_date_targets(&mut targets, &record.birth_date);
        self.add_snils_targets(&mut targets, &record.snils);
        self.add_address_targets(&mut targets, &record.address);

        // Remaining sensitive values verbatim, length-filtered so that
        // erasing e.g. a one-letter sex marker cannot shred the text
        for value in [&record.sex, &record.birth_date, &record.address, &record.snils, &record.policy_number] {
            let value = value.trim();
            if char_len(value) >= 3 {
                targets.insert(value.to_string());
            }
        }

        targets
    }

    fn add_name_targets(&self, targets: &mut HashSet<String>, full_name: &str) {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return;
        }
        targets.insert(full_name.to_string());

        for part in full_name.split_whitespace() {
            // Original tokens always go in, even initials
            targets.insert(part.to_string());

            let stripped: String = part
                .chars()
                .filter(|c| !matches!(c, '.' | '-' | '\''))
                .collect();
            if char_len(&stripped) < 2 {
                continue;
            }

            for form in self.morph.lexeme_forms(part) {
                if char_len(&form) >= 2 {
                    targets.insert(form);
                }
            }
        }
    }

    fn add_birth_date_targets(&self, targets: &mut HashSet<String>, birth_date: &str) {
        let value = birth_date.trim();
        // дд.мм.гггг is 10 chars; anything shorter is not a full date
        if char_len(value) < 10 {
            return;
        }

        targets.insert(value.to_string());
        for suffix in DATE_SUFFIXES {
            targets.insert(format!("{value}{suffix}"));
        }

        let mut parts = value.split('.');
        let (Some(day), Some(month), Some(year)) = (
            parts.next().and_then(|p| p.parse::<u32>().ok()),
            parts.next().and_then(|p| p.parse::<usize>().ok()),
            parts.next().and_then(|p| p.parse::<i32>().ok()),
        ) else {
            return;
        };

        if !(1..=12).contains(&month) {
            return;
        }
        let month_name = MONTHS_GENITIVE[month - 1];
        let capitalized = capitalize(month_name);

        for name in [month_name, capitalized.as_str()] {
            targets.insert(format!("{day} {name} {year}"));
            targets.insert(format!("{day:02} {name} {year}"));
            targets.insert(format!("{day} {name} {year}г."));
            targets.insert(format!("{day} {name} {year} года"));
            targets.insert(format!("{day:02} {name} {year} года"));
        }
    }

    fn add_snils_targets(&self, targets: &mut HashSet<String>, snils: &str) {
        let digits: String = snils.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 11 {
            return;
        }

        let body = &digits[..9];
        let ctrl = &digits[9..];
        let (b1, b2, b3) = (&body[..3], &body[3..6], &body[6..]);

        for variant in [
            format!("{b1}-{b2}-{b3} {ctrl}"),
            format!("{b1}-{b2}-{b3}- {ctrl}"),
            format!("{b1}-{b2}-{b3}{ctrl}"),
            format!("{b1} {b2} {b3} {ctrl}"),
            format!("{body} {ctrl}"),
            format!("{body}{ctrl}"),
        ] {
            targets.insert(variant);
        }
    }

    fn add_address_targets(&self, targets: &mut HashSet<String>, address: &str) {
        let value = address.trim();
        if char_len(value) < 3 {
            return;
        }
        targets.insert(value.to_string());

        let words: Vec<&str> = address_token_re()
            .find_iter(value)
            .map(|m| m.as_str())
            .collect();

        for pair in words.windows(2) {
            let bigram = pair.join(" ");
            if char_len(&bigram) >= 3 {
                targets.insert(bigram);
            }
        }
        for triple in words.windows(3) {
            let trigram = triple.join(" ");
            if char_len(&trigram) >= 5 {
                targets.insert(trigram);
            }
        }
    }

    /// Remove all personal values from the text and prepend the metadata
    /// header. `uin` and `age` go into the header; the output is keyed by
    /// the per-document id elsewhere — this function only transforms text.
    pub fn sanitize(
        &self,
        text: &str,
        record: &ExtractionRecord,
        uin: Option<&str>,
        age: &str,
        format: SourceFormat,
    ) -> String {
        let mut cleaned = text.to_string();

        // Longest first, lexicographic tie-break for determinism
        let mut ordered: Vec<String> = self.removal_targets(record).into_iter().collect();
        ordered.sort_by(|a, b| char_len(b).cmp(&char_len(a)).then_with(|| a.cmp(b)));

        for value in &ordered {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(value));
            match Regex::new(&pattern) {
                Ok(re) => cleaned = re.replace_all(&cleaned, "").into_owned(),
                Err(e) => {
                    tracing::warn!(target_len = value.len(), error = %e, "Skipping unremovable target");
                }
            }
        }

        for re in address_regexes() {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }

        let cleaned = collapse_whitespace(&cleaned);

        let header = format!(
            "УИН пациента: {}\n\n\
             Возраст пациента на момент госпитализации: {}\n\n\
             Пол пациента: {}\n\n\
             Расширение изначального файла: {}\n\n",
            uin.unwrap_or("не указан"),
            age,
            record.sex,
            format.as_ext(),
        );

        format!("{header}{cleaned}")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    let spaces = SPACES.get_or_init(|| Regex::new(r" +").expect("static regex"));
    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n\s*\n+|\n+").expect("static regex"));

    let collapsed = spaces.replace_all(text, " ");
    newlines.replace_all(&collapsed, "\n").trim().to_string()
}
