use serde::{Deserialize, Serialize};

use super::canonical::parse_year;

/// One printing of a work, as listed by the provider's editions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditionRecord {
    /// Edition key, e.g. `OL7353617M`.
    pub key: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Four-digit year when the provider date contained one, else the raw date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    /// Raw language tags (`/languages/eng`, `eng`, `English`).
    #[serde(default)]
    pub languages: Vec<String>,
}

impl EditionRecord {
    pub fn year(&self) -> Option<i32> {
        self.published_date.as_deref().and_then(parse_year)
    }
}
