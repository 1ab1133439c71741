//! Turns a raw query plus a search-type hint into a provider-agnostic intent.
//!
//! Author detection is an ordered list of [`AuthorHeuristic`]s. The planner
//! takes the first candidate; the ranker tries every candidate against each
//! record's real authors.

use once_cell::sync::Lazy;
use regex::Regex;
use shelfscope_core::SearchType;
use shelfscope_core::config::{FranchiseRule, PlannerConfig};
use tracing::debug;

use crate::identifiers::Isbn;
use crate::text::collapse_whitespace;

static BY_CLAUSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\bby\s+(.+)$").expect("valid regex"));
static VOLUME_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s|#)([1-9])(?:\s|$)").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "in", "on", "to", "for", "with", "at", "from", "by", "book",
    "books", "volume", "vol", "part", "series", "edition", "novel", "is", "my", "your",
];

/// What the providers should be asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    Isbn(String),
    Title(String),
    Author(String),
    /// `exact` marks a canonical title pinned by the franchise table.
    AuthorTitle {
        author: String,
        title: String,
        exact: bool,
    },
    FreeText(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIntent {
    pub query: String,
    pub search_type: SearchType,
    pub max_results: usize,
    pub target: QueryTarget,
}

/// Strategies for spotting an author inside free text, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorHeuristic {
    /// `"<title> by <name>"`; the name must run to the end of the query.
    ByClause,
    /// A name-shaped run of 2-4 tokens at the start or end of the query.
    NameRun,
}

pub const DEFAULT_HEURISTICS: &[AuthorHeuristic] =
    &[AuthorHeuristic::ByClause, AuthorHeuristic::NameRun];

/// A candidate author span and the query left over once it is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorMention {
    pub author: String,
    pub remainder: String,
    pub heuristic: AuthorHeuristic,
}

#[derive(Debug, Clone, Default)]
pub struct QueryPlanner {
    franchises: Vec<FranchiseRule>,
}

impl QueryPlanner {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            franchises: config.franchises.clone(),
        }
    }

    pub fn plan(&self, query: &str, search_type: SearchType, max_results: usize) -> SearchIntent {
        let query = collapse_whitespace(query);
        let target = match search_type {
            SearchType::Isbn => QueryTarget::Isbn(strip_isbn_query(&query)),
            SearchType::Title => QueryTarget::Title(query.clone()),
            SearchType::Author => QueryTarget::Author(query.clone()),
            SearchType::General => self.plan_general(&query),
        };
        debug!(query = %query, ?target, "planned search");
        SearchIntent {
            query,
            search_type,
            max_results,
            target,
        }
    }

    fn plan_general(&self, query: &str) -> QueryTarget {
        if let Some(target) = self.franchise_target(query) {
            return target;
        }
        if Isbn::looks_like(query) {
            return QueryTarget::Isbn(strip_isbn_query(query));
        }
        match author_mentions(query).into_iter().next() {
            Some(mention) if mention.remainder.is_empty() => QueryTarget::Author(mention.author),
            Some(mention) => QueryTarget::AuthorTitle {
                author: mention.author,
                title: mention.remainder,
                exact: false,
            },
            None => QueryTarget::FreeText(query.to_string()),
        }
    }

    fn franchise_target(&self, query: &str) -> Option<QueryTarget> {
        let lower = query.to_lowercase();
        let rule = self
            .franchises
            .iter()
            .find(|rule| lower.contains(&rule.name.to_lowercase()))?;
        let volume: usize = VOLUME_DIGIT_RE
            .captures(&lower)
            .and_then(|caps| caps[1].parse().ok())?;
        let title = rule.titles.get(volume.checked_sub(1)?)?;
        Some(QueryTarget::AuthorTitle {
            author: rule.author.clone(),
            title: title.clone(),
            exact: true,
        })
    }
}

/// Every author candidate the heuristics find, in heuristic order.
pub fn author_mentions(query: &str) -> Vec<AuthorMention> {
    author_mentions_with(query, DEFAULT_HEURISTICS)
}

pub fn author_mentions_with(query: &str, heuristics: &[AuthorHeuristic]) -> Vec<AuthorMention> {
    let mut mentions: Vec<AuthorMention> = Vec::new();
    for heuristic in heuristics {
        let found = match heuristic {
            AuthorHeuristic::ByClause => by_clause(query).into_iter().collect(),
            AuthorHeuristic::NameRun => name_runs(query),
        };
        for mention in found {
            if !mentions.iter().any(|m| m.author == mention.author) {
                mentions.push(mention);
            }
        }
    }
    mentions
}

fn by_clause(query: &str) -> Option<AuthorMention> {
    let lower = query.to_lowercase();
    let caps = BY_CLAUSE_RE.captures(&lower)?;
    let author = collapse_whitespace(&caps[2]);
    let tokens: Vec<&str> = author.split_whitespace().collect();
    if !is_name_shaped(&tokens) {
        return None;
    }
    Some(AuthorMention {
        author,
        remainder: collapse_whitespace(&caps[1]),
        heuristic: AuthorHeuristic::ByClause,
    })
}

fn name_runs(query: &str) -> Vec<AuthorMention> {
    let original: Vec<&str> = query.split_whitespace().collect();
    let lower = query.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let has_case_signal = query.chars().any(char::is_uppercase);

    let mut out = Vec::new();
    for (start, end) in [leading_run(&tokens), trailing_run(&tokens)]
        .into_iter()
        .flatten()
    {
        let run = &tokens[start..end];
        let remainder: Vec<&str> = tokens[..start]
            .iter()
            .chain(tokens[end..].iter())
            .copied()
            .collect();
        if !is_name_shaped(run) || remainder.len() < 2 {
            continue;
        }
        if has_case_signal && !original[start..end].iter().all(|t| is_capitalized(t)) {
            continue;
        }
        out.push(AuthorMention {
            author: run.join(" "),
            remainder: remainder.join(" "),
            heuristic: AuthorHeuristic::NameRun,
        });
    }
    out
}

/// Initials followed by a surname, or a given name plus surname.
fn leading_run(tokens: &[&str]) -> Option<(usize, usize)> {
    let initials = tokens.iter().take(3).take_while(|t| is_initial(t)).count();
    let end = if initials > 0 { initials + 1 } else { 2 };
    (end <= tokens.len()).then_some((0, end))
}

fn trailing_run(tokens: &[&str]) -> Option<(usize, usize)> {
    let len = tokens.len();
    if len < 2 {
        return None;
    }
    let initials = tokens[..len - 1]
        .iter()
        .rev()
        .take(3)
        .take_while(|t| is_initial(t))
        .count();
    let start = len - 1 - initials.max(1);
    Some((start, len))
}

fn is_name_shaped(tokens: &[&str]) -> bool {
    (2..=4).contains(&tokens.len())
        && tokens.iter().all(|t| {
            t.chars().all(|c| c.is_alphabetic() || c == '.')
                && t.chars().any(char::is_alphabetic)
                && !STOP_WORDS.contains(&t.to_lowercase().as_str())
        })
}

fn is_initial(token: &str) -> bool {
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    (token.ends_with('.') && (1..=3).contains(&letters))
        || (letters == 1 && token.chars().count() == 1)
}

fn is_capitalized(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn strip_isbn_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect::<String>()
        .to_uppercase()
}
