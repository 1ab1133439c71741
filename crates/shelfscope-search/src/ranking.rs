//! Relevance scoring of canonical records against the raw query.

use shelfscope_core::CanonicalBook;
use shelfscope_core::config::RankingConfig;
use shelfscope_core::parse_year;
use strsim::normalized_levenshtein;

use crate::planner::author_mentions;
use crate::text::{normalize_title, significant_words};

const AUTHOR_EXACT: i32 = 80;
const AUTHOR_CONTAINS: i32 = 60;
const AUTHOR_LAST_NAME: i32 = 40;
const AUTHOR_MISMATCH: i32 = -50;

const TITLE_EXACT: i32 = 100;
const TITLE_CONTAINS_QUERY: i32 = 70;
const QUERY_CONTAINS_TITLE: i32 = 50;
const OVERLAP_SCALE: f64 = 40.0;
const OVERLAP_EXACT_WORD: i32 = 5;
const FUZZY_WORD_THRESHOLD: f64 = 0.8;

/// Per-signal contributions; `total` is floored at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub author: i32,
    pub title: i32,
    pub quality: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        (self.author + self.title + self.quality).max(0) as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceRanker {
    common_surnames: Vec<String>,
}

impl RelevanceRanker {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            common_surnames: config
                .common_surnames
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    pub fn score(&self, book: &CanonicalBook, query: &str) -> u32 {
        self.breakdown(book, query).total()
    }

    pub fn breakdown(&self, book: &CanonicalBook, query: &str) -> ScoreBreakdown {
        let (author, remaining) = self.author_signal(book, query);
        ScoreBreakdown {
            author,
            title: title_score(&book.title, &remaining),
            quality: quality_bonus(book),
        }
    }

    /// Author score and the query left once the author span is removed.
    fn author_signal(&self, book: &CanonicalBook, query: &str) -> (i32, String) {
        let normalized_title = normalize_title(&book.title);
        let authors: Vec<String> = book.authors.iter().map(|a| normalize_title(a)).collect();

        // A "name" that is really part of this record's title is no author signal.
        let mentions: Vec<_> = author_mentions(query)
            .into_iter()
            .filter(|m| !contains_words(&normalized_title, &normalize_title(&m.author)))
            .collect();

        for mention in &mentions {
            let candidate = normalize_title(&mention.author);
            if let Some(score) = authors
                .iter()
                .filter_map(|author| self.author_match(&candidate, author))
                .max()
            {
                return (score, mention.remainder.clone());
            }
        }

        if let Some(found) = literal_author(query, &authors) {
            return found;
        }

        match mentions.first() {
            Some(mention) if !authors.is_empty() => (AUTHOR_MISMATCH, mention.remainder.clone()),
            Some(mention) => (0, mention.remainder.clone()),
            None => (0, query.to_string()),
        }
    }

    fn author_match(&self, candidate: &str, author: &str) -> Option<i32> {
        if candidate.is_empty() || author.is_empty() {
            return None;
        }
        if candidate == author {
            return Some(AUTHOR_EXACT);
        }
        if contains_words(author, candidate) || contains_words(candidate, author) {
            return Some(AUTHOR_CONTAINS);
        }
        let last = |name: &str| name.split_whitespace().last().map(ToOwned::to_owned);
        match (last(candidate), last(author)) {
            (Some(a), Some(b))
                if a == b && a.chars().count() > 1 && !self.common_surnames.contains(&a) =>
            {
                Some(AUTHOR_LAST_NAME)
            }
            _ => None,
        }
    }
}

/// A record author's full name written out in the query.
fn literal_author(query: &str, authors: &[String]) -> Option<(i32, String)> {
    let normalized_query = normalize_title(query);
    authors
        .iter()
        .filter(|author| author.split_whitespace().count() >= 2)
        .find(|author| contains_words(&normalized_query, author))
        .map(|author| {
            let padded = format!(" {normalized_query} ");
            let remaining = padded.replacen(&format!(" {author} "), " ", 1);
            (AUTHOR_EXACT, remaining.trim().to_string())
        })
}

fn title_score(title: &str, remaining: &str) -> i32 {
    let remaining = normalize_title(remaining);
    let title = normalize_title(title);
    if remaining.is_empty() || title.is_empty() {
        return 0;
    }
    if remaining == title {
        return TITLE_EXACT;
    }
    if title.contains(&remaining) {
        return TITLE_CONTAINS_QUERY;
    }
    if remaining.contains(&title) {
        return QUERY_CONTAINS_TITLE;
    }

    let query_words = significant_words(&remaining);
    if query_words.is_empty() {
        return 0;
    }
    let title_words = significant_words(&title);
    let mut shared = 0usize;
    let mut exact = 0i32;
    for word in &query_words {
        if title_words.contains(word) {
            shared += 1;
            exact += 1;
        } else if title_words
            .iter()
            .any(|t| normalized_levenshtein(word, t) >= FUZZY_WORD_THRESHOLD)
        {
            shared += 1;
        }
    }
    let ratio = shared as f64 / query_words.len() as f64;
    (ratio * OVERLAP_SCALE).round() as i32 + exact * OVERLAP_EXACT_WORD
}

fn quality_bonus(book: &CanonicalBook) -> i32 {
    let mut bonus = 0;
    if book.page_count.is_some_and(|p| p > 0) {
        bonus += 3;
    }
    let edition_year = book.edition_published_date.as_deref().and_then(parse_year);
    let original_year = book.original_published_date.as_deref().and_then(parse_year);
    if let (Some(edition), Some(original)) = (edition_year, original_year)
        && edition != original
    {
        bonus += 2;
    }
    if book.thumbnail.is_some() {
        bonus += 2;
    }
    if book.has_isbn() {
        bonus += 2;
    }
    if book.year().is_some_and(|y| y > 1800 && y < 2025) {
        bonus += 1;
    }
    bonus
}

/// Whole-word containment of `needle` in `haystack` (both normalized).
fn contains_words(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && format!(" {haystack} ").contains(&format!(" {needle} "))
}
