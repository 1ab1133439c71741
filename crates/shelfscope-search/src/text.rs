//! String normalization shared by the planner, ranker and matchers.

use std::collections::HashSet;

/// Lowercase, drop apostrophes, turn other punctuation into spaces and
/// collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '’'))
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct words longer than two characters, in first-seen order.
pub fn significant_words(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .filter(|w| seen.insert(*w))
        .collect()
}

/// Uppercase the first letter of every word, leaving the rest untouched.
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
