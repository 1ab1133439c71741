use std::fmt;

use serde::{Deserialize, Serialize};

/// A catalog provider that contributed data to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    GoogleBooks,
    OpenLibrary,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleBooks => "google_books",
            Self::OpenLibrary => "open_library",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a canonical record came from as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSource {
    GoogleBooks,
    OpenLibrary,
    Merged,
}

impl From<ProviderTag> for BookSource {
    fn from(tag: ProviderTag) -> Self {
        match tag {
            ProviderTag::GoogleBooks => Self::GoogleBooks,
            ProviderTag::OpenLibrary => Self::OpenLibrary,
        }
    }
}

/// Open Library data that has no canonical field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSidecar {
    /// Bare work key, e.g. `OL45804W`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_key: Option<String>,

    #[serde(default)]
    pub subjects: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition_count: Option<u32>,
}

impl ProviderSidecar {
    pub fn is_empty(&self) -> bool {
        self.work_key.is_none() && self.subjects.is_empty() && self.edition_count.is_none()
    }

    /// Fill missing fields from `other`.
    pub fn backfill(&mut self, other: &ProviderSidecar) {
        if self.work_key.is_none() {
            self.work_key = other.work_key.clone();
        }
        if self.subjects.is_empty() {
            self.subjects = other.subjects.clone();
        }
        if self.edition_count.is_none() {
            self.edition_count = other.edition_count;
        }
    }
}
