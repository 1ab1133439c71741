use std::cmp::Reverse;
use std::sync::Arc;

use shelfscope_core::{EditionRecord, EditionsResponse};
use tracing::{debug, warn};

use crate::error::{Result, SearchError};
use crate::sources::EditionCatalog;
use crate::sources::language::is_english;
use crate::sources::openlibrary::bare_work_key;
use crate::text::{normalize_title, significant_words};

const MIN_SHARED_WORDS: usize = 2;

/// Lists and filters the editions of a work.
pub struct EditionResolver {
    catalog: Arc<dyn EditionCatalog>,
}

impl EditionResolver {
    pub fn new(catalog: Arc<dyn EditionCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn resolve(
        &self,
        work_id: &str,
        limit: usize,
        english_only: bool,
        original_title: Option<&str>,
    ) -> Result<EditionsResponse> {
        let work_key = bare_work_key(work_id)
            .ok_or_else(|| SearchError::InvalidRequest("work identifier is empty".to_string()))?;
        if limit == 0 {
            return Err(SearchError::InvalidRequest(
                "edition limit must be positive".to_string(),
            ));
        }

        // Over-fetch to make up for what the filters drop.
        let fetch = limit * if english_only { 3 } else { 2 };
        let editions = match self.catalog.fetch_editions(&work_key, fetch).await {
            Ok(editions) => editions,
            Err(SearchError::WorkNotFound(_)) => {
                debug!(work_key = %work_key, "work not found");
                return Ok(response(work_key, Vec::new(), Some("Work not found".to_string())));
            }
            Err(err) if err.is_provider_failure() => {
                warn!(work_key = %work_key, error = %err, "edition lookup failed");
                return Ok(EditionsResponse {
                    success: false,
                    message: Some(err.to_string()),
                    ..response(work_key, Vec::new(), None)
                });
            }
            Err(err) => return Err(err),
        };

        let fetched = editions.len();
        let mut editions: Vec<EditionRecord> = if english_only {
            let original = original_title.map(normalize_title);
            editions
                .into_iter()
                .filter(is_english_edition)
                .filter(|e| {
                    original
                        .as_deref()
                        .is_none_or(|title| titles_related(title, &normalize_title(&e.title)))
                })
                .collect()
        } else {
            editions
        };

        // `None < Some`, so reversing puts undated editions last.
        editions.sort_by_key(|e| Reverse(e.year()));
        editions.truncate(limit);
        debug!(work_key = %work_key, fetched, kept = editions.len(), "editions resolved");

        let message = editions
            .is_empty()
            .then(|| "No editions found".to_string());
        Ok(response(work_key, editions, message))
    }
}

fn response(
    work_key: String,
    editions: Vec<EditionRecord>,
    message: Option<String>,
) -> EditionsResponse {
    EditionsResponse {
        success: true,
        total_editions: editions.len(),
        editions,
        work_key,
        message,
    }
}

/// Every tag must read as English; untagged editions are ambiguous.
fn is_english_edition(edition: &EditionRecord) -> bool {
    !edition.languages.is_empty() && edition.languages.iter().all(|tag| is_english(tag))
}

fn titles_related(original: &str, candidate: &str) -> bool {
    if original.is_empty() || candidate.is_empty() {
        return false;
    }
    if original.contains(candidate) || candidate.contains(original) {
        return true;
    }
    let candidate_words = significant_words(candidate);
    significant_words(original)
        .iter()
        .filter(|w| candidate_words.contains(w))
        .count()
        >= MIN_SHARED_WORDS
}
