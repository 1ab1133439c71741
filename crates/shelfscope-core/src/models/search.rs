use serde::{Deserialize, Serialize};

use super::canonical::{CanonicalBook, ProviderTag};
use super::edition::EditionRecord;

/// Hint describing what the raw query string contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    General,
    Isbn,
    Title,
    Author,
}

/// How the post-ranking steps (original-date backfill, enrichment
/// collaborator) are applied to the ranked list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentMode {
    #[default]
    None,
    TopOnly,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub enrichment: EnrichmentMode,
}

fn default_max_results() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_type: SearchType::General,
            max_results: default_max_results(),
            enrichment: EnrichmentMode::None,
        }
    }

    pub fn with_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_enrichment(mut self, mode: EnrichmentMode) -> Self {
        self.enrichment = mode;
        self
    }
}

/// Which providers the returned list was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    MergedApis,
    GoogleBooksEnhanced,
    OpenLibraryPrimary,
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub total_items: usize,
    pub books: Vec<CanonicalBook>,
    pub source: SearchSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<ProviderTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    pub fn no_results(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            total_items: 0,
            books: Vec::new(),
            source: SearchSource::NoResults,
            sources: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionsResponse {
    pub success: bool,
    pub total_editions: usize,
    pub editions: Vec<EditionRecord>,
    pub work_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
