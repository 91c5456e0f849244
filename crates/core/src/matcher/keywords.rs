//! Fixed keyword table mapping free-text test names to a category.
//!
//! Rules are tried in order and the first hit wins.

use regex::Regex;
use std::sync::LazyLock;

struct KeywordRule {
    pattern: Regex,
    category: &'static str,
}

static KEYWORD_RULES: LazyLock<Vec<KeywordRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, category| KeywordRule {
        pattern: Regex::new(pattern).expect("keyword pattern is a valid regex"),
        category,
    };
    vec![
        rule(r"(?i)\bmalaria\b|\bmp\s*card\b", "MICROBIOLOGY"),
        rule(
            r"(?i)\bcbc\b|\bcomplete\s+blood\s+(?:count|picture)\b",
            "HAEMATOLOGY",
        ),
        rule(r"(?i)\bwidal\b", "SEROLOGY"),
        rule(r"(?i)\bblood\s+group\b|\brh\b", "HAEMATOLOGY"),
    ]
});

/// Category name implied by keywords in `test_name`, if any.
pub fn keyword_category(test_name: &str) -> Option<&'static str> {
    KEYWORD_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(test_name))
        .map(|rule| rule.category)
}
