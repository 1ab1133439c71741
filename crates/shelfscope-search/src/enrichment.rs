//! Post-ranking enrichment through an external collaborator.
//!
//! The hook owns the lookup and the payload; this module only decides when
//! and for which records it is consulted.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use shelfscope_core::{CanonicalBook, EnrichmentMode};
use tracing::warn;

use crate::error::Result;

#[async_trait]
pub trait EnrichmentHook: Send + Sync {
    /// Whether `book` carries enough to look up.
    fn wants(&self, book: &CanonicalBook) -> bool {
        !book.title.trim().is_empty() && !book.authors.is_empty()
    }

    /// Opaque payload stored on `audiobook_data`; `None` means nothing found.
    async fn enrich(&self, book: &CanonicalBook) -> Result<Option<Value>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub enriched: usize,
    pub errors: Vec<String>,
}

impl EnrichmentReport {
    fn record(&mut self, book: &mut CanonicalBook, outcome: Result<Option<Value>>) {
        self.attempted += 1;
        match outcome {
            Ok(Some(payload)) => {
                book.audiobook_data = Some(payload);
                self.enriched += 1;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(id = %book.id, error = %err, "enrichment failed");
                self.errors.push(format!("{}: {err}", book.id));
            }
        }
    }
}

/// Top-only walks the first `top_count` records one at a time; all runs
/// every record with up to `concurrency` lookups in flight.
pub async fn apply_enrichment(
    hook: &dyn EnrichmentHook,
    mode: EnrichmentMode,
    books: &mut [CanonicalBook],
    top_count: usize,
    concurrency: usize,
) -> EnrichmentReport {
    let mut report = EnrichmentReport::default();
    match mode {
        EnrichmentMode::None => {}
        EnrichmentMode::TopOnly => {
            for book in books.iter_mut().take(top_count) {
                if hook.wants(book) {
                    let outcome = hook.enrich(book).await;
                    report.record(book, outcome);
                }
            }
        }
        EnrichmentMode::All => {
            let outcomes: Vec<(usize, Result<Option<Value>>)> = futures::stream::iter(
                books
                    .iter()
                    .enumerate()
                    .filter(|(_, book)| hook.wants(book)),
            )
            .map(|(i, book)| async move { (i, hook.enrich(book).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

            for (i, outcome) in outcomes {
                report.record(&mut books[i], outcome);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use shelfscope_core::ProviderTag;

    use super::*;
    use crate::error::SearchError;

    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EnrichmentHook for CountingHook {
        async fn enrich(&self, book: &CanonicalBook) -> Result<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if book.title == "Broken" {
                return Err(SearchError::ProviderUnavailable {
                    provider: ProviderTag::GoogleBooks,
                    reason: "HTTP 500".to_string(),
                });
            }
            Ok(Some(json!({"available": true, "title": book.title})))
        }
    }

    fn hook() -> CountingHook {
        CountingHook {
            calls: AtomicUsize::new(0),
        }
    }

    fn books() -> Vec<CanonicalBook> {
        ["Dune", "Broken", "Anonymous", "Emma"]
            .iter()
            .map(|title| {
                let mut book = CanonicalBook::new(*title, *title, ProviderTag::GoogleBooks);
                if *title != "Anonymous" {
                    book.authors = vec!["Someone".to_string()];
                }
                book
            })
            .collect()
    }

    #[tokio::test]
    async fn none_mode_does_nothing() {
        let hook = hook();
        let mut books = books();
        let report = apply_enrichment(&hook, EnrichmentMode::None, &mut books, 1, 4).await;
        assert_eq!(report, EnrichmentReport::default());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn top_only_enriches_the_leading_records() {
        let hook = hook();
        let mut books = books();
        let report = apply_enrichment(&hook, EnrichmentMode::TopOnly, &mut books, 1, 4).await;

        assert_eq!(report.enriched, 1);
        assert!(books[0].audiobook_data.is_some());
        assert!(books[3].audiobook_data.is_none());
    }

    #[tokio::test]
    async fn all_mode_skips_unwanted_and_survives_failures() {
        let hook = hook();
        let mut books = books();
        let report = apply_enrichment(&hook, EnrichmentMode::All, &mut books, 1, 2).await;

        // "Anonymous" has no author and is never sent.
        assert_eq!(hook.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.enriched, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(books[1].audiobook_data.is_none());
        assert_eq!(books[3].audiobook_data.as_ref().unwrap()["title"], "Emma");
    }
}
