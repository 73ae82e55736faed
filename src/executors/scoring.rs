//! Lexical match scoring between a query fragment and a candidate.

use std::collections::BTreeSet;

/// Words that carry no search signal.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "best", "by", "for", "from", "find", "how", "in",
    "is", "it", "latest", "new", "of", "on", "or", "show", "the", "to", "top", "what", "which",
    "with", "me", "list", "about", "current", "state", "recent",
];

/// Lower-cased search tokens of `text`, stop words removed.
///
/// Splits on anything that is not alphanumeric, `-` or `.` so part numbers
/// such as `LMR36520-Q1` and decimal ratings like `4.5v` survive intact.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '.'))
        .map(|t| t.trim_matches(|c: char| c == '-' || c == '.'))
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Whether `token` looks like a part number: starts with a letter, contains
/// a digit and is at least four characters long. Ratings such as `600v` or
/// `100khz` start with a digit and do not qualify.
pub fn is_identifier(token: &str) -> bool {
    token.chars().count() >= 4
        && token.starts_with(|c: char| c.is_alphabetic())
        && token.chars().any(|c| c.is_ascii_digit())
}

/// Provisional relevance of a candidate in `[0, 1]`.
///
/// An exact identifier match (a part number in the fragment equals the
/// candidate's key) scores 1.0. Otherwise the score is the share of
/// fragment tokens that also occur in the candidate text.
pub fn relevance(fragment: &str, candidate_text: &str, candidate_key: Option<&str>) -> f64 {
    let wanted: BTreeSet<String> = tokenize(fragment).into_iter().collect();
    if wanted.is_empty() {
        return 0.0;
    }

    if let Some(key) = candidate_key {
        let key = key.to_lowercase();
        if wanted.iter().any(|t| is_identifier(t) && *t == key) {
            return 1.0;
        }
    }

    let have: BTreeSet<String> = tokenize(candidate_text).into_iter().collect();
    let hits = wanted.iter().filter(|t| have.contains(*t)).count();
    (hits as f64 / wanted.len() as f64).clamp(0.0, 1.0)
}
