//! Keyword tables and canonical TRL definitions.

/// One-line definition of each readiness level, index 0 = TRL 1.
pub const TRL_DEFINITIONS: [&str; 9] = [
    "basic principles observed and reported",
    "technology concept and application formulated",
    "experimental proof of concept",
    "technology validated in the laboratory",
    "technology validated in a relevant environment",
    "technology demonstrated in a relevant environment",
    "system prototype demonstrated in an operational environment",
    "system complete and qualified",
    "actual system proven in operational environment",
];

/// Definition for a level; out-of-range values are clamped.
pub fn definition(trl: u8) -> &'static str {
    TRL_DEFINITIONS[(trl.clamp(1, 9) - 1) as usize]
}

/// Text indicators per level, highest level first.
pub(crate) const LEVEL_INDICATORS: [(u8, &[&str]); 9] = [
    (9, &["deployed", "mass production", "high volume", "proven", "commercially available"]),
    (8, &["production", "in production", "qualified", "certified", "released"]),
    (7, &["pre-production", "qualification", "operational test", "engineering samples", "sampling"]),
    (6, &["prototype demonstration", "system test", "beta", "pilot production", "pilot line"]),
    (5, &["field test", "relevant environment", "pilot", "in-vehicle"]),
    (4, &["laboratory validation", "component test", "bench test", "breadboard"]),
    (3, &["experiment", "experimental", "proof of concept", "lab test", "prototype", "measured"]),
    (2, &["concept", "feasibility", "proposed", "initial design"]),
    (1, &["theoretical", "principle", "basic research", "hypothesis", "simulation"]),
];

/// Standards and qualification marks that count as pilot-band evidence.
pub(crate) const STANDARDS_MARKERS: [&str; 7] = [
    "aec-q100",
    "aec-q101",
    "aec-q200",
    "iso 26262",
    "iec 61508",
    "compliant",
    "ppap",
];

/// Whether `phrase` occurs in `text` as a whole word sequence.
///
/// Hyphens count as word characters so `production` does not match inside
/// `pre-production`.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '-';
    text.match_indices(phrase).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + phrase.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Highest indicator level present in `text` and the phrase that matched.
pub(crate) fn highest_indicator(text: &str) -> Option<(u8, &'static str)> {
    LEVEL_INDICATORS.iter().find_map(|(level, phrases)| {
        phrases
            .iter()
            .find(|p| contains_phrase(text, p))
            .map(|p| (*level, *p))
    })
}

/// First standards marker found in `text`.
pub(crate) fn standards_marker(text: &str) -> Option<&'static str> {
    STANDARDS_MARKERS
        .iter()
        .find(|m| contains_phrase(text, m))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_respects_hyphenated_words() {
        assert!(contains_phrase("now in production since 2021", "production"));
        assert!(!contains_phrase("pre-production units", "production"));
        assert!(contains_phrase("pre-production units", "pre-production"));
        assert!(!contains_phrase("reproduction", "production"));
    }

    #[test]
    fn test_highest_indicator_prefers_higher_level() {
        assert_eq!(
            highest_indicator("a proof of concept now in mass production"),
            Some((9, "mass production"))
        );
        assert_eq!(highest_indicator("bench test results"), Some((4, "bench test")));
        assert_eq!(highest_indicator("nothing relevant here"), None);
    }

    #[test]
    fn test_definition_clamps() {
        assert_eq!(definition(0), TRL_DEFINITIONS[0]);
        assert_eq!(definition(12), TRL_DEFINITIONS[8]);
    }
}
