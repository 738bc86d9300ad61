//! Morphological analysis seam for the sanitizer.
//!
//! Russian personal names inflect by case, so erasing only the surface
//! form found by the model leaves the oblique forms ("Иванова",
//! "Иванову", …) in the text. The sanitizer asks a [`MorphAnalyzer`] for
//! every surface form of each name token. The analyzer is a stateless
//! service object constructed once per process and passed in explicitly.

/// Enumerates the surface forms of a word's lexeme.
pub trait MorphAnalyzer: Send + Sync {
    /// All surface forms of the word, including the word itself,
    /// lowercased. For words the analyzer cannot inflect this is just the
    /// word itself.
    fn lexeme_forms(&self, word: &str) -> Vec<String>;
}

/// Rule-based Russian declension for personal-name tokens.
///
/// Covers the nominal paradigms that matter for names: -ов/-ев/-ёв/-ин/-ын
/// surnames and their feminine forms, adjectival -ский/-цкий surnames,
/// first names ending in a consonant, -а/-я, -й, and -ь. Indeclinable
/// endings fall through to the identity. Not a dictionary analyzer — a
/// dictionary-backed implementation can be swapped in behind the trait.
pub struct RussianMorph;

/// Stem-final consonants after which и replaces ы.
const VELARS_AND_HUSHERS: &[char] = &['г', 'к', 'х', 'ж', 'ч', 'ш', 'щ'];

impl RussianMorph {
    pub fn new() -> Self {
        Self
    }

    fn is_cyrillic_word(word: &str) -> bool {
        !word.is_empty() && word.chars().all(|c| ('а'..='я').contains(&c) || c == 'ё')
    }
}

impl Default for RussianMorph {
    fn default() -> Self {
        Self::new()
    }
}

impl MorphAnalyzer for RussianMorph {
    fn lexeme_forms(&self, word: &str) -> Vec<String> {
        let word = word.to_lowercase();
        if !Self::is_cyrillic_word(&word) {
            return vec![word];
        }

        let chars: Vec<char> = word.chars().collect();
        let mut forms = vec![word.clone()];
        let mut push = |stem: &str, endings: &[&str]| {
            for ending in endings {
                forms.push(format!("{stem}{ending}"));
            }
        };

        let strip = |n: usize| chars[..chars.len() - n].iter().collect::<String>();

        if word.ends_with("ова")
            || word.ends_with("ева")
            || word.ends_with("ёва")
            || word.ends_with("ина")
            || word.ends_with("ына")
        {
            // Feminine surname: Иванова → Ивановой, Иванову
            let stem = strip(1);
            push(&stem, &["ой", "у"]);
        } else if word.ends_with("ов")
            || word.ends_with("ев")
            || word.ends_with("ёв")
            || word.ends_with("ин")
            || word.ends_with("ын")
        {
            // Masculine surname: Иванов → Иванова, Иванову, Ивановым,
            // Иванове, plus the feminine nominative/oblique forms
            push(&word, &["а", "у", "ым", "е", "ой"]);
        } else if word.ends_with("ский") || word.ends_with("цкий") {
            let stem = strip(2);
            push(&stem, &["ого", "ому", "им", "ом"]);
        } else if word.ends_with("ская") || word.ends_with("цкая") {
            let stem = strip(2);
            push(&stem, &["ой", "ую"]);
        } else if word.ends_with('а') {
            let stem = strip(1);
            let gen = if stem
                .chars()
                .last()
                .is_some_and(|c| VELARS_AND_HUSHERS.contains(&c))
            {
                "и"
            } else {
                "ы"
            };
            push(&stem, &[gen, "е", "у", "ой"]);
        } else if word.ends_with('я') {
            let stem = strip(1);
            push(&stem, &["и", "е", "ю", "ей"]);
        } else if word.ends_with('й') || word.ends_with('ь') {
            let stem = strip(1);
            push(&stem, &["я", "ю", "ем", "е"]);
        } else if chars
            .last()
            .is_some_and(|c| !matches!(c, 'а' | 'е' | 'ё' | 'и' | 'о' | 'у' | 'ы' | 'э' | 'ю' | 'я'))
        {
            // First name / surname ending in a consonant: Иван → Ивана…
            push(&word, &["а", "у", "ом", "е"]);
        }
        // Vowel-final words not matched above are indeclinable

        forms.sort();
        forms.dedup();
        forms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forms(word: &str) -> Vec<String> {
        RussianMorph::new().lexeme_forms(word)
    }

    #[test]
    fn masculine_surname_declension() {
        let f = forms("Иванов");
        for expected in ["иванов", "иванова", "иванову", "ивановым", "иванове"] {
            assert!(f.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn feminine_surname_declension() {
        let f = forms("Иванова");
        assert!(f.contains(&"ивановой".to_string()));
        assert!(f.contains(&"иванову".to_string()));
    }

    #[test]
    fn first_name_consonant_declension() {
        let f = forms("Иван");
        for expected in ["иван", "ивана", "ивану", "иваном", "иване"] {
            assert!(f.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn name_ending_in_a() {
        let f = forms("Анна");
        for expected in ["анна", "анны", "анне", "анну", "анной"] {
            assert!(f.contains(&expected.to_string()), "missing {expected}");
        }
        // и after velars
        assert!(forms("Ольга").contains(&"ольги".to_string()));
    }

    #[test]
    fn name_ending_in_j() {
        let f = forms("Сергей");
        for expected in ["сергей", "сергея", "сергею", "сергеем", "сергее"] {
            assert!(f.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn soft_sign_name() {
        let f = forms("Игорь");
        assert!(f.contains(&"игоря".to_string()));
        assert!(f.contains(&"игорем".to_string()));
    }

    #[test]
    fn adjectival_surname() {
        let f = forms("Бельский");
        assert!(f.contains(&"бельского".to_string()));
        assert!(f.contains(&"бельским".to_string()));
        let f = forms("Бельская");
        assert!(f.contains(&"бельской".to_string()));
        assert!(f.contains(&"бельскую".to_string()));
    }

    #[test]
    fn non_cyrillic_word_passes_through() {
        assert_eq!(forms("Smith"), vec!["smith".to_string()]);
        assert_eq!(forms("№123"), vec!["№123".to_string()]);
    }

    #[test]
    fn forms_are_deduplicated_and_lowercase() {
        let f = forms("ИВАНОВ");
        let mut sorted = f.clone();
        sorted.dedup();
        assert_eq!(f, sorted);
        assert!(f.iter().all(|w| w.chars().all(|c| !c.is_uppercase())));
    }
}
