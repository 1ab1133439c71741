use async_trait::async_trait;
use shelfscope_core::{CanonicalBook, EditionRecord, ProviderTag};

use crate::error::Result;
use crate::planner::SearchIntent;

pub mod google_books;
pub mod language;
pub mod openlibrary;

pub use google_books::GoogleBooksSource;
pub use openlibrary::OpenLibrarySource;

/// One catalog that can answer a planned search.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;

    /// Zero results is `Ok(vec![])`; only transport, status and payload
    /// failures are errors.
    async fn search(&self, intent: &SearchIntent) -> Result<Vec<CanonicalBook>>;
}

/// A lightweight hit from a first-publication lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationCandidate {
    pub title: String,
    pub authors: Vec<String>,
    pub first_publish_year: Option<i32>,
    pub work_key: Option<String>,
}

/// Single-book lookups used to discover when a work was first published.
#[async_trait]
pub trait PublicationLookup: Send + Sync {
    async fn lookup_by_title(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<PublicationCandidate>>;

    async fn lookup_by_isbn(&self, isbn: &str) -> Result<Vec<PublicationCandidate>>;
}

/// Lists the known editions of a work.
#[async_trait]
pub trait EditionCatalog: Send + Sync {
    /// `work_key` is bare (`OL45804W`). An unknown work is
    /// [`SearchError::WorkNotFound`](crate::error::SearchError::WorkNotFound).
    async fn fetch_editions(&self, work_key: &str, limit: usize) -> Result<Vec<EditionRecord>>;
}
