mod provider;
mod variant;

pub use provider::*;
pub use variant::*;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Provider-agnostic book record produced by an adapter and refined by the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBook {
    /// Provider-scoped opaque id.
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Credit order.
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Date of this specific printing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition_published_date: Option<String>,

    /// First-ever publication; may predate the edition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_published_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_count: Option<u32>,

    pub source: BookSource,
    pub sources: BTreeSet<ProviderTag>,
    pub primary_source: ProviderTag,

    /// Assigned by the ranker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<u32>,

    #[serde(default)]
    pub edition_variants: Vec<EditionVariant>,

    #[serde(default, skip_serializing_if = "ProviderSidecar::is_empty")]
    pub provider_data: ProviderSidecar,

    /// Opaque payload attached by the enrichment collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiobook_data: Option<serde_json::Value>,
}

impl CanonicalBook {
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: ProviderTag) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            authors: Vec::new(),
            publisher: None,
            edition_published_date: None,
            original_published_date: None,
            isbn13: None,
            isbn10: None,
            page_count: None,
            categories: Vec::new(),
            description: None,
            language: None,
            thumbnail: None,
            info_link: None,
            average_rating: None,
            ratings_count: None,
            source: provider.into(),
            sources: BTreeSet::from([provider]),
            primary_source: provider,
            relevance_score: None,
            edition_variants: Vec::new(),
            provider_data: ProviderSidecar::default(),
            audiobook_data: None,
        }
    }

    pub fn score(&self) -> u32 {
        self.relevance_score.unwrap_or(0)
    }

    pub fn has_isbn(&self) -> bool {
        self.isbn13.is_some() || self.isbn10.is_some()
    }

    /// Year of this edition, falling back to the original publication year.
    pub fn year(&self) -> Option<i32> {
        self.edition_published_date
            .as_deref()
            .and_then(parse_year)
            .or_else(|| self.original_published_date.as_deref().and_then(parse_year))
    }

    /// True when the edition date and the original date fall in the same year.
    pub fn is_original_publication(&self) -> bool {
        match (
            self.edition_published_date.as_deref().and_then(parse_year),
            self.original_published_date.as_deref().and_then(parse_year),
        ) {
            (Some(edition), Some(original)) => edition == original,
            _ => false,
        }
    }

    /// Union categories, skipping case-insensitive duplicates.
    pub fn add_categories<I>(&mut self, categories: I)
    where
        I: IntoIterator<Item = String>,
    {
        for category in categories {
            let lower = category.to_lowercase();
            if !self.categories.iter().any(|c| c.to_lowercase() == lower) {
                self.categories.push(category);
            }
        }
    }

    pub fn snapshot(&self, is_original: bool) -> EditionVariant {
        EditionVariant {
            title: self.title.clone(),
            publisher: self.publisher.clone(),
            published_date: self.edition_published_date.clone(),
            isbn13: self.isbn13.clone(),
            isbn10: self.isbn10.clone(),
            page_count: self.page_count,
            thumbnail: self.thumbnail.clone(),
            description: self.description.clone(),
            source: Some(self.primary_source),
            is_original,
        }
    }
}

/// First four-digit run in a free-form date string.
pub fn parse_year(input: &str) -> Option<i32> {
    input.chars().collect::<Vec<_>>().windows(4).find_map(|w| {
        let candidate = w.iter().collect::<String>();
        if candidate.chars().all(|c| c.is_ascii_digit()) {
            candidate.parse::<i32>().ok()
        } else {
            None
        }
    })
}
