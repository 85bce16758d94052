//! Text normalization for street matching
//!
//! - Whitespace collapsing with case folding ([`fold`])
//! - Diacritics and punctuation stripping ([`normalize`])
//! - Expansion of common street type abbreviations ([`expand_abbreviations`])

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Street type abbreviations seen in registry and user data.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("str", "strasse"),
    ("av", "avenue"),
    ("ave", "avenue"),
    ("bd", "boulevard"),
    ("bld", "boulevard"),
    ("ch", "chemin"),
    ("che", "chemin"),
    ("imp", "impasse"),
    ("pl", "place"),
    ("r", "rue"),
    ("rte", "route"),
    ("sq", "square"),
    ("st", "saint"),
    ("ste", "sainte"),
];

/// Case-insensitive comparison key keeping every character.
pub fn fold(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize street text for matching.
///
/// # Examples
///
/// ```
/// use resolver::address::normalize::normalize;
///
/// assert_eq!(normalize("Rue de l'Église"), "rue de l eglise");
/// assert_eq!(normalize("Grosse  Gasse"), "grosse gasse");
/// ```
pub fn normalize(s: &str) -> String {
    let mut stripped = String::with_capacity(s.len());
    for c in s.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        match c {
            'ß' => stripped.push_str("ss"),
            c if c.is_alphanumeric() => stripped.push(c),
            _ => stripped.push(' '),
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize, then expand abbreviated street types.
///
/// Compound German names ending in `str` are expanded too (`hauptstr`).
pub fn expand_abbreviations(s: &str) -> String {
    normalize(s)
        .split_whitespace()
        .map(expand_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_token(token: &str) -> String {
    if let Some((_, full)) = ABBREVIATIONS.iter().find(|(short, _)| *short == token) {
        return full.to_string();
    }
    match token.strip_suffix("str") {
        Some(stem) if stem.chars().count() >= 2 => format!("{}strasse", stem),
        _ => token.to_string(),
    }
}

/// Normalized words, used for overlap scoring.
pub fn tokens(s: &str) -> Vec<String> {
    expand_abbreviations(s)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
