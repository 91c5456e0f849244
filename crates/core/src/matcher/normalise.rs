//! Pure text normalisation used by the test matcher.
//!
//! Kept free of store access so the punctuation-tolerant matching can be tested on its own.

use regex::{Regex, RegexBuilder};

fn is_loose_separator(c: char) -> bool {
    c.is_whitespace() || c == '.'
}

/// Trims and collapses internal whitespace runs to a single space.
pub fn normalise_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds a case-insensitive pattern that matches `name` with any periods or whitespace
/// between its characters, so `C.B.C`, `CBC` and `C B C` all match one another.
///
/// The result has the shape `^[\s.]*c1[\s.]*c2...cn[\s.]*$`: runs of separators are allowed
/// between characters and at either end. Returns `None` when `name` holds only separators.
pub fn loose_pattern(name: &str) -> Option<Regex> {
    const SEPARATORS: &str = r"[\s.]*";

    let parts: Vec<String> = name
        .chars()
        .filter(|c| !is_loose_separator(*c))
        .map(|c| regex::escape(c.encode_utf8(&mut [0u8; 4])))
        .collect();
    if parts.is_empty() {
        return None;
    }

    let pattern = format!(
        "^{SEPARATORS}{}{SEPARATORS}$",
        parts.join(SEPARATORS)
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Upper-cased text with every period and whitespace character removed.
pub fn compact_key(text: &str) -> String {
    text.chars()
        .filter(|c| !is_loose_separator(*c))
        .flat_map(char::to_uppercase)
        .collect()
}

/// First whitespace-delimited token of `name`.
pub fn first_token(name: &str) -> Option<&str> {
    name.split_whitespace().next()
}

/// Lower-cased text with all whitespace removed, for comparing parameter names.
pub fn parameter_key(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_name_collapses_whitespace() {
        assert_eq!(normalise_name("  Lipid \t  Profile "), "Lipid Profile");
        assert_eq!(normalise_name("   "), "");
    }

    #[test]
    fn test_loose_pattern_tolerates_periods_and_spacing() {
        let pattern = loose_pattern("C.B.C").expect("pattern should build");
        for candidate in ["CBC", "cbc", "C B C", "C.B.C.", "C. B. C", " .CBC", "C..B  C"] {
            assert!(pattern.is_match(candidate), "{candidate:?} should match");
        }
        assert!(!pattern.is_match("CBC Count"));
        assert!(!pattern.is_match("XCBC"));
    }

    #[test]
    fn test_loose_pattern_escapes_metacharacters() {
        let pattern = loose_pattern("T3 (Free)+").expect("pattern should build");
        assert!(pattern.is_match("T3(Free)+"));
        assert!(!pattern.is_match("T3 Free"));
    }

    #[test]
    fn test_loose_pattern_rejects_separator_only_input() {
        assert!(loose_pattern(" . . ").is_none());
    }

    #[test]
    fn test_compact_key_and_parameter_key() {
        assert_eq!(compact_key("s. Bilirubin total"), "SBILIRUBINTOTAL");
        assert_eq!(parameter_key(" Total  WBC Count "), "totalwbccount");
    }

    #[test]
    fn test_first_token() {
        assert_eq!(first_token("  Serum Creatinine"), Some("Serum"));
        assert_eq!(first_token(""), None);
    }
}
