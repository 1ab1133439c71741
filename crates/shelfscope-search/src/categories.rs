use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use shelfscope_core::config::CategoryConfig;

use crate::text::title_case;

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 49;
const PLACEHOLDER: char = '\u{1}';

static SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/").expect("valid regex"));
static SLASH_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/,]").expect("valid regex"));
static SLASH_AMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/|&|\s+and\s+").expect("valid regex"));
static ALL_SEPARATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[/,]|&|\s+and\s+").expect("valid regex"));

/// Splits free-text provider categories into atomic genre tokens.
#[derive(Debug, Clone)]
pub struct CategoryNormalizer {
    split_on_comma: bool,
    split_on_ampersand: bool,
    protected: Vec<Regex>,
    mappings: HashMap<String, String>,
    denylist: Vec<String>,
}

impl CategoryNormalizer {
    pub fn new(config: &CategoryConfig) -> Self {
        let protected = config
            .protected
            .iter()
            .filter_map(|phrase| Regex::new(&format!("(?i){}", regex::escape(phrase))).ok())
            .collect();
        Self {
            split_on_comma: config.split_on_comma,
            split_on_ampersand: config.split_on_ampersand,
            protected,
            mappings: config
                .mappings
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            denylist: config.denylist.iter().map(|d| d.to_lowercase()).collect(),
        }
    }

    pub fn with_splits(mut self, comma: bool, ampersand: bool) -> Self {
        self.split_on_comma = comma;
        self.split_on_ampersand = ampersand;
        self
    }

    /// Normalize a list of raw category strings into deduplicated tokens.
    pub fn normalize<I, S>(&self, raw: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for value in raw {
            for token in self.split(value.as_ref()) {
                let Some(token) = self.clean(&token) else {
                    continue;
                };
                if seen.insert(token.to_lowercase()) {
                    out.push(token);
                }
            }
        }
        out
    }

    fn split(&self, raw: &str) -> Vec<String> {
        let mut kept = Vec::new();
        let mut masked = raw.to_string();
        for re in &self.protected {
            masked = re
                .replace_all(&masked, |caps: &regex::Captures<'_>| {
                    kept.push(caps[0].to_string());
                    format!("{PLACEHOLDER}{}{PLACEHOLDER}", kept.len() - 1)
                })
                .into_owned();
        }

        let separators: &Regex = match (self.split_on_comma, self.split_on_ampersand) {
            (true, true) => &ALL_SEPARATORS_RE,
            (true, false) => &SLASH_COMMA_RE,
            (false, true) => &SLASH_AMP_RE,
            (false, false) => &SLASH_RE,
        };

        separators
            .split(&masked)
            .map(|piece| restore(piece, &kept))
            .collect()
    }

    fn clean(&self, token: &str) -> Option<String> {
        let token = token.trim();
        let lower = token.to_lowercase();
        if self.denylist.iter().any(|term| lower.contains(term.as_str())) {
            return None;
        }
        let formatted = match self.mappings.get(&lower) {
            Some(mapped) => mapped.clone(),
            None => title_case(token),
        };
        let len = formatted.chars().count();
        (MIN_LEN..=MAX_LEN).contains(&len).then_some(formatted)
    }
}

fn restore(piece: &str, kept: &[String]) -> String {
    if kept.is_empty() || !piece.contains(PLACEHOLDER) {
        return piece.to_string();
    }
    let mut out = String::new();
    for (i, part) in piece.split(PLACEHOLDER).enumerate() {
        // Odd parts sit between two placeholder markers.
        if i % 2 == 1 {
            match part.parse::<usize>().ok().and_then(|idx| kept.get(idx)) {
                Some(original) => out.push_str(original),
                None => out.push_str(part),
            }
        } else {
            out.push_str(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> CategoryNormalizer {
        CategoryNormalizer::new(&CategoryConfig::default())
    }

    #[test]
    fn ampersand_split_is_configurable() {
        let split = normalizer().with_splits(true, true);
        assert_eq!(
            split.normalize(["Science Fiction & Fantasy"]),
            vec!["Science Fiction", "Fantasy"]
        );

        let kept = normalizer().with_splits(true, false);
        assert_eq!(
            kept.normalize(["Science Fiction & Fantasy"]),
            vec!["Science Fiction & Fantasy"]
        );
    }

    #[test]
    fn slashes_always_split() {
        let n = normalizer().with_splits(false, false);
        assert_eq!(
            n.normalize(["Fiction / Science Fiction / Hard Science Fiction"]),
            vec!["Fiction", "Science Fiction", "Hard Science Fiction"]
        );
    }

    #[test]
    fn and_only_splits_as_a_word() {
        let n = normalizer();
        assert_eq!(
            n.normalize(["Brand management and marketing"]),
            vec!["Brand Management", "Marketing"]
        );
        assert_eq!(n.normalize(["Grandparents"]), vec!["Grandparents"]);
    }

    #[test]
    fn protected_compounds_survive() {
        let n = normalizer();
        assert_eq!(
            n.normalize(["Health & Fitness", "Body, Mind & Spirit / Meditation"]),
            vec!["Health & Fitness", "Body, Mind & Spirit", "Meditation"]
        );
    }

    #[test]
    fn admin_terms_and_bad_lengths_are_dropped() {
        let n = normalizer();
        let long = "x".repeat(60);
        let out = n.normalize([
            "Accessible book",
            "Protected DAISY",
            "In library",
            "a",
            long.as_str(),
            "Mystery",
        ]);
        assert_eq!(out, vec!["Mystery"]);
    }

    #[test]
    fn dedups_case_insensitively_and_maps_known_terms() {
        let n = normalizer();
        assert_eq!(
            n.normalize(["fantasy", "Fantasy", "Juvenile Fiction"]),
            vec!["Fantasy", "Children's Fiction"]
        );
    }
}
