//! Title-keyed merge of the two provider streams.
//!
//! Records are upserted by [`dedup_key`]. Provider A's stream always goes in
//! first, so on a tie the A record stays primary. A non-special-edition
//! record displaces a special edition as primary.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use shelfscope_core::{BookSource, CanonicalBook, normalize_field, push_variant};
use tracing::debug;

use crate::text::normalize_title;

static BRACKETED_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[(\[][^)\]]*\b(?:deluxe|special|collector['’]?s|anniversary|limited|illustrated|hardcover|hardback|paperback|box(?:ed)?\s+set|edition)\b[^)\]]*[)\]]",
    )
    .expect("valid regex")
});
// Format words go bare; words that also occur in ordinary titles only
// count when followed by "edition" (or an ordinal, for anniversaries).
static EDITION_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:\d+(?:st|nd|rd|th)\s+)?(?:(?:deluxe|collector['’]?s|hardcover|hardback|paperback|box(?:ed)?\s+set)\b(?:\s+edition\b)?|(?:special|anniversary|limited|illustrated)\s+edition\b)|\b\d+(?:st|nd|rd|th)\s+anniversary\b",
    )
    .expect("valid regex")
});
static VOLUME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b(?:book|volume|vol|part)\.?\s*|#)\d+\b").expect("valid regex")
});
static TRAILING_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[(\[][^)\]]*[)\]]\s*$").expect("valid regex"));
static SPECIAL_EDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:deluxe|collector['’]?s|hardcover|hardback|paperback|box(?:ed)?\s+set)\b|\b(?:special|anniversary|limited|illustrated)\s+edition\b|[(\[][^)\]]*\b(?:special|anniversary|limited|illustrated)\b[^)\]]*[)\]]",
    )
    .expect("valid regex")
});

/// Normalized title used to decide that two records describe the same work.
pub fn dedup_key(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = BRACKETED_NOISE_RE.replace_all(&lower, " ");
    let stripped = EDITION_NOISE_RE.replace_all(&stripped, " ");
    let stripped = VOLUME_RE.replace_all(&stripped, " ");
    let stripped = TRAILING_ANNOTATION_RE.replace_all(stripped.trim_end(), "");
    normalize_title(&stripped)
}

pub fn is_special_edition(title: &str) -> bool {
    SPECIAL_EDITION_RE.is_match(title)
}

/// Upsert both streams and sort by descending score.
///
/// `score` is evaluated once per incoming record; a merged record keeps the
/// higher of its two inputs' scores.
pub fn reconcile<F>(
    primary_stream: Vec<CanonicalBook>,
    secondary_stream: Vec<CanonicalBook>,
    score: F,
) -> Vec<CanonicalBook>
where
    F: Fn(&CanonicalBook) -> u32,
{
    let mut merged: Vec<CanonicalBook> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for mut book in primary_stream.into_iter().chain(secondary_stream) {
        book.relevance_score = Some(score(&book));
        let mut key = dedup_key(&book.title);
        if key.is_empty() {
            key = format!("id:{}", book.id);
        }

        match index.get(&key) {
            None => {
                index.insert(key, merged.len());
                merged.push(book);
            }
            Some(&slot) => {
                let existing = &merged[slot];
                let incoming_wins =
                    is_special_edition(&existing.title) && !is_special_edition(&book.title);
                debug!(
                    key = %key,
                    existing = %existing.id,
                    incoming = %book.id,
                    incoming_wins,
                    "merging duplicate"
                );
                merged[slot] = if incoming_wins {
                    merge_records(&book, existing)
                } else {
                    merge_records(existing, &book)
                };
            }
        }
    }

    // `sort_by` is stable: equal scores keep insertion order.
    merged.sort_by(|a, b| b.score().cmp(&a.score()));
    merged
}

/// Build a new record from `primary`, filling its gaps from `secondary`.
pub fn merge_records(primary: &CanonicalBook, secondary: &CanonicalBook) -> CanonicalBook {
    let mut out = primary.clone();

    fill(&mut out.subtitle, &secondary.subtitle);
    fill(&mut out.publisher, &secondary.publisher);
    fill(&mut out.edition_published_date, &secondary.edition_published_date);
    fill(&mut out.original_published_date, &secondary.original_published_date);
    fill(&mut out.isbn13, &secondary.isbn13);
    fill(&mut out.isbn10, &secondary.isbn10);
    fill(&mut out.thumbnail, &secondary.thumbnail);
    fill(&mut out.description, &secondary.description);
    fill(&mut out.language, &secondary.language);
    fill(&mut out.info_link, &secondary.info_link);
    fill(&mut out.audiobook_data, &secondary.audiobook_data);
    if out.page_count.is_none() {
        out.page_count = secondary.page_count;
    }
    if out.average_rating.is_none() {
        out.average_rating = secondary.average_rating;
        out.ratings_count = secondary.ratings_count;
    }
    if out.authors.is_empty() {
        out.authors = secondary.authors.clone();
    }

    out.add_categories(secondary.categories.iter().cloned());
    out.provider_data.backfill(&secondary.provider_data);

    out.sources.extend(secondary.sources.iter().copied());
    out.source = if out.sources.len() > 1 {
        BookSource::Merged
    } else {
        primary.primary_source.into()
    };
    out.primary_source = primary.primary_source;
    out.relevance_score = Some(primary.score().max(secondary.score()));

    for variant in &secondary.edition_variants {
        push_variant(&mut out.edition_variants, variant.clone());
    }
    if disagree(primary, secondary) {
        let confirmed_original = out.is_original_publication();
        push_variant(&mut out.edition_variants, primary.snapshot(confirmed_original));
        push_variant(&mut out.edition_variants, secondary.snapshot(false));
    }

    out
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

/// Whether two records describe different printings.
fn disagree(a: &CanonicalBook, b: &CanonicalBook) -> bool {
    let differs = |x: Option<&str>, y: Option<&str>| normalize_field(x) != normalize_field(y);
    differs(Some(&a.title), Some(&b.title))
        || differs(a.publisher.as_deref(), b.publisher.as_deref())
        || differs(
            a.edition_published_date.as_deref(),
            b.edition_published_date.as_deref(),
        )
        || differs(a.isbn13.as_deref(), b.isbn13.as_deref())
        || differs(a.isbn10.as_deref(), b.isbn10.as_deref())
}
