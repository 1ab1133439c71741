use serde::{Deserialize, Serialize};

use super::provider::ProviderTag;

/// Snapshot of one printing, kept when merged records disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditionVariant {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderTag>,

    #[serde(default)]
    pub is_original: bool,
}

/// Identity of a variant: normalized title, publisher and date plus raw ISBNs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    title: String,
    publisher: String,
    date: String,
    isbn13: String,
    isbn10: String,
}

impl EditionVariant {
    pub fn key(&self) -> VariantKey {
        VariantKey {
            title: normalize_field(Some(&self.title)),
            publisher: normalize_field(self.publisher.as_deref()),
            date: normalize_field(self.published_date.as_deref()),
            isbn13: self.isbn13.clone().unwrap_or_default(),
            isbn10: self.isbn10.clone().unwrap_or_default(),
        }
    }
}

/// Append `variant` unless its key is already present. A duplicate can only
/// upgrade `is_original` from false to true.
pub fn push_variant(variants: &mut Vec<EditionVariant>, variant: EditionVariant) {
    let key = variant.key();
    match variants.iter_mut().find(|existing| existing.key() == key) {
        Some(existing) => existing.is_original |= variant.is_original,
        None => variants.push(variant),
    }
}

/// Lowercase and collapse whitespace; used for case/whitespace-insensitive comparisons.
pub fn normalize_field(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
