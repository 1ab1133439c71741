use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use shelfscope_core::{CanonicalBook, EnrichmentMode, ProviderTag};
use shelfscope_core::config::TitleAlias;
use shelfscope_core::parse_year;
use tracing::debug;

use crate::sources::{PublicationCandidate, PublicationLookup};
use crate::text::normalize_title;

/// What a successful lookup found for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPublication {
    pub year: i32,
    pub work_key: Option<String>,
}

/// Looks up the first-publication year of Provider A records on Provider B.
pub struct OriginalDateBackfill {
    lookup: Arc<dyn PublicationLookup>,
    aliases: Vec<(String, String)>,
    concurrency: usize,
}

impl OriginalDateBackfill {
    pub fn new(
        lookup: Arc<dyn PublicationLookup>,
        aliases: &[TitleAlias],
        concurrency: usize,
    ) -> Self {
        Self {
            lookup,
            aliases: aliases
                .iter()
                .map(|a| (normalize_title(&a.regional), normalize_title(&a.canonical)))
                .collect(),
            concurrency: concurrency.max(1),
        }
    }

    /// Backfill the Provider A records of a ranked list. Top-only walks the
    /// first `top_count` records one at a time; all runs every record through
    /// [`backfill_all`](Self::backfill_all). The whole pass shares one
    /// deadline, after which unfinished records keep their provider dates.
    pub async fn backfill_ranked(
        &self,
        mode: EnrichmentMode,
        books: &mut [CanonicalBook],
        top_count: usize,
        deadline: Duration,
    ) {
        if mode == EnrichmentMode::None || books.is_empty() {
            return;
        }
        let pass = async {
            match mode {
                EnrichmentMode::None => {}
                EnrichmentMode::TopOnly => {
                    for book in books.iter_mut().take(top_count) {
                        if from_provider_a(book) {
                            *book = self.backfill(book.clone()).await;
                        }
                    }
                }
                EnrichmentMode::All => {
                    let (slots, pending): (Vec<usize>, Vec<CanonicalBook>) = books
                        .iter()
                        .enumerate()
                        .filter(|(_, book)| from_provider_a(book))
                        .map(|(i, book)| (i, book.clone()))
                        .unzip();
                    let done = self.backfill_all(pending).await;
                    for (i, book) in slots.into_iter().zip(done) {
                        books[i] = book;
                    }
                }
            }
        };
        if tokio::time::timeout(deadline, pass).await.is_err() {
            debug!(
                deadline_ms = deadline.as_millis() as u64,
                "backfill deadline reached"
            );
        }
    }

    /// Backfill every record, preserving order. Never fails.
    pub async fn backfill_all(&self, books: Vec<CanonicalBook>) -> Vec<CanonicalBook> {
        let mut done: Vec<(usize, CanonicalBook)> =
            futures::stream::iter(books.into_iter().enumerate())
                .map(|(i, book)| async move { (i, self.backfill(book).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        done.sort_by_key(|(i, _)| *i);
        done.into_iter().map(|(_, book)| book).collect()
    }

    pub async fn backfill(&self, mut book: CanonicalBook) -> CanonicalBook {
        let Some(found) = self.find_original(&book).await else {
            return book;
        };
        let known = book.original_published_date.as_deref().and_then(parse_year);
        if known.is_none_or(|year| found.year < year) {
            book.original_published_date = Some(found.year.to_string());
        }
        if book.provider_data.work_key.is_none() {
            book.provider_data.work_key = found.work_key;
        }
        book
    }

    /// Title+author lookup first, ISBN lookup second. Lookup failures end the
    /// attempt without an error.
    pub async fn find_original(&self, book: &CanonicalBook) -> Option<OriginalPublication> {
        let author = book.authors.first().map(String::as_str);
        match self.lookup.lookup_by_title(&book.title, author).await {
            Ok(candidates) => {
                let matches = candidates
                    .iter()
                    .filter(|c| self.is_likely_match(book, c, false));
                if let Some(found) = earliest(matches) {
                    return Some(found);
                }
            }
            Err(err) => debug!(id = %book.id, error = %err, "title lookup failed"),
        }

        let isbn = book.isbn13.as_deref().or(book.isbn10.as_deref())?;
        match self.lookup.lookup_by_isbn(isbn).await {
            Ok(candidates) => earliest(
                candidates
                    .iter()
                    .filter(|c| self.is_likely_match(book, c, true)),
            ),
            Err(err) => {
                debug!(id = %book.id, error = %err, "isbn lookup failed");
                None
            }
        }
    }

    /// A candidate found by ISBN is the same work; otherwise titles and
    /// authors must agree.
    pub fn is_likely_match(
        &self,
        book: &CanonicalBook,
        candidate: &PublicationCandidate,
        by_isbn: bool,
    ) -> bool {
        if by_isbn {
            return true;
        }
        self.titles_match(&book.title, &candidate.title)
            && authors_match(&book.authors, &candidate.authors)
    }

    fn titles_match(&self, a: &str, b: &str) -> bool {
        let a = self.canonical_title(a);
        let b = self.canonical_title(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a == b || a.contains(&b) || b.contains(&a)
    }

    fn canonical_title(&self, title: &str) -> String {
        let mut normalized = normalize_title(title);
        for (regional, canonical) in &self.aliases {
            if normalized.contains(regional.as_str()) {
                normalized = normalized.replace(regional.as_str(), canonical);
            }
        }
        normalized
    }
}

fn from_provider_a(book: &CanonicalBook) -> bool {
    book.sources.contains(&ProviderTag::GoogleBooks)
}

/// Missing author data on either side passes.
fn authors_match(ours: &[String], theirs: &[String]) -> bool {
    if ours.is_empty() || theirs.is_empty() {
        return true;
    }
    ours.iter().any(|a| {
        let a = normalize_title(a);
        theirs.iter().any(|b| {
            let b = normalize_title(b);
            let last_a = a.split_whitespace().last();
            let last_b = b.split_whitespace().last();
            (last_a.is_some() && last_a == last_b)
                || a.contains(&b)
                || b.contains(&a)
                || a
                    .split_whitespace()
                    .filter(|t| t.chars().count() > 2)
                    .any(|t| b.split_whitespace().any(|u| u == t))
        })
    })
}

fn earliest<'a, I>(candidates: I) -> Option<OriginalPublication>
where
    I: Iterator<Item = &'a PublicationCandidate>,
{
    candidates
        .filter_map(|c| {
            c.first_publish_year.map(|year| OriginalPublication {
                year,
                work_key: c.work_key.clone(),
            })
        })
        .min_by_key(|found| found.year)
}
