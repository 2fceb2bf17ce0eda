//! English pluralization
//!
//! Rule-based: uncountable words, irregular forms, then suffix rules tried
//! most specific first. The case of the input word is carried over to the
//! plural ("Person" -> "People", "BOOK" -> "BOOKS").
//!
//! Uncountable and irregular words are matched against the last word of a
//! compound, so "SalesPerson" becomes "SalesPeople". Words ending in "man"
//! take "men" even when written as one word ("Chairman" -> "Chairmen").

use regex::Regex;

/// Words whose plural is the word itself
const UNCOUNTABLE: &[&str] = &[
    "bison", "data", "deer", "equipment", "feedback", "fish", "information",
    "media", "metadata", "moose", "news", "police", "rice", "series", "sheep",
    "software", "species", "traffic",
];

/// (singular, plural) pairs that no suffix rule produces
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("louse", "lice"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

/// Words ending in "man" that are not compounds of it
const MAN_LOOKALIKES: &[&str] = &["caiman", "german", "human", "ottoman", "roman", "shaman", "talisman"];

/// Singular words ending in "men"
const MEN_LOOKALIKES: &[&str] = &["abdomen", "acumen", "hymen", "lumen", "omen", "regimen", "specimen", "stamen"];

/// Suffix rules; the first match wins
const RULES: &[(&str, &str)] = &[
    (r"(?i)(quiz)$", "${1}zes"),
    (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    (r"(?i)(octop|vir)us$", "${1}i"),
    (r"(?i)(alias|status|campus)$", "${1}es"),
    (r"(?i)(bu)s$", "${1}ses"),
    (r"(?i)(buffal|tomat|potat|her|ech)o$", "${1}oes"),
    (r"(?i)([ti])um$", "${1}a"),
    (r"(?i)(ax|test)is$", "${1}es"),
    (r"(?i)sis$", "ses"),
    (r"(?i)(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    (r"(?i)(hive)$", "${1}s"),
    (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
    (r"(?i)(x|ch|ss|sh|zz)$", "${1}es"),
    (r"(?i)s$", "s"),
    (r"(?i)$", "s"),
];

/// Compiled English plural rules
#[derive(Debug, Clone)]
pub struct Pluralizer {
    rules: Vec<(Regex, &'static str)>,
}

impl Pluralizer {
    /// Build the English rule set
    pub fn english() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|regex| (regex, *replacement))
            })
            .collect();
        Self { rules }
    }

    /// Pluralize a single word
    pub fn plural(&self, word: &str) -> String {
        if word.is_empty() {
            return String::new();
        }

        let (head, last) = split_last_word(word);
        let lower = last.to_lowercase();

        if UNCOUNTABLE.contains(&lower.as_str()) || is_irregular_plural(&lower) {
            return word.to_string();
        }

        if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
            return format!("{}{}", head, restore_case(last, plural));
        }

        if let Some(stem) = man_compound_stem(word) {
            return format!("{}{}", stem, restore_case(&word[stem.len()..], "men"));
        }

        for (regex, replacement) in &self.rules {
            if regex.is_match(word) {
                let plural = regex.replace(word, *replacement).into_owned();
                if is_upper(word) {
                    return plural.to_uppercase();
                }
                return plural;
            }
        }

        word.to_string()
    }
}

/// Split off the last word of a compound, at a separator or a lower-to-upper
/// case change
fn split_last_word(word: &str) -> (&str, &str) {
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (i, c) in word.char_indices() {
        match prev {
            Some(p) if !p.is_alphanumeric() => start = i,
            Some(p) if c.is_uppercase() && (p.is_lowercase() || p.is_numeric()) => start = i,
            _ => {}
        }
        prev = Some(c);
    }
    word.split_at(start)
}

fn is_irregular_plural(lower: &str) -> bool {
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return true;
    }
    lower.ends_with("women")
        || (lower.len() > 3
            && lower.ends_with("men")
            && !MEN_LOOKALIKES.iter().any(|w| lower.ends_with(w)))
}

/// Everything before a trailing "man", when the word is a compound of it
fn man_compound_stem(word: &str) -> Option<&str> {
    let split = word.len().checked_sub(3)?;
    if split == 0 || !word.is_char_boundary(split) {
        return None;
    }
    let (stem, suffix) = word.split_at(split);
    if !suffix.eq_ignore_ascii_case("man") {
        return None;
    }
    let lower = word.to_lowercase();
    if MAN_LOOKALIKES.iter().any(|w| lower.ends_with(w)) {
        return None;
    }
    Some(stem)
}

impl Default for Pluralizer {
    fn default() -> Self {
        Self::english()
    }
}

fn is_upper(word: &str) -> bool {
    word.chars().any(|c| c.is_alphabetic()) && word == word.to_uppercase()
}

/// Apply the casing of `original` to `replacement`
fn restore_case(original: &str, replacement: &str) -> String {
    if original.len() > 1 && is_upper(original) {
        return replacement.to_uppercase();
    }

    let mut chars = original.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            let mut out = String::with_capacity(replacement.len());
            let mut rest = replacement.chars();
            if let Some(head) = rest.next() {
                out.extend(head.to_uppercase());
            }
            out.extend(rest.map(|c| c.to_ascii_lowercase()));
            out
        }
        _ => replacement.to_lowercase(),
    }
}
