use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root search configuration, loaded from `~/.config/shelfscope/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfscopeConfig {
    pub providers: ProvidersConfig,
    pub timeouts: TimeoutConfig,
    pub planner: PlannerConfig,
    pub ranking: RankingConfig,
    pub matching: MatchingConfig,
    pub categories: CategoryConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google_books_url: String,
    /// Name of the env var holding an optional Google Books API key.
    pub google_books_api_key_env: String,
    pub open_library_url: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub search_secs: u64,
    pub lookup_secs: u64,
    pub editions_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub franchises: Vec<FranchiseRule>,
}

/// A franchise whose numbered volumes are searched by exact canonical title.
///
/// `titles[0]` is volume 1. A query mentioning `name` plus a digit selects
/// the matching title and pins the author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseRule {
    pub name: String,
    pub author: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Surnames that double as ordinary words; never matched on last name alone.
    pub common_surnames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub title_aliases: Vec<TitleAlias>,
}

/// Two title fragments that name the same volume in different regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleAlias {
    pub regional: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub split_on_comma: bool,
    pub split_on_ampersand: bool,
    /// Raw subjects considered per record before normalization.
    pub max_subjects: usize,
    /// Compound genres that are never split.
    pub protected: Vec<String>,
    /// Administrative/boilerplate fragments; any token containing one is dropped.
    pub denylist: Vec<String>,
    /// Lowercased token -> display name; unmapped tokens are title-cased.
    pub mappings: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub backfill_original_dates: bool,
    pub backfill_concurrency: usize,
    /// Records enriched in top-only mode.
    pub top_count: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google_books_url: "https://www.googleapis.com/books/v1".to_string(),
            google_books_api_key_env: "GOOGLE_BOOKS_API_KEY".to_string(),
            open_library_url: "https://openlibrary.org".to_string(),
            user_agent: "shelfscope/0.1".to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            search_secs: 8,
            lookup_secs: 5,
            editions_secs: 10,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            franchises: vec![FranchiseRule {
                name: "harry potter".to_string(),
                author: "J.K. Rowling".to_string(),
                titles: [
                    "Harry Potter and the Sorcerer's Stone",
                    "Harry Potter and the Chamber of Secrets",
                    "Harry Potter and the Prisoner of Azkaban",
                    "Harry Potter and the Goblet of Fire",
                    "Harry Potter and the Order of the Phoenix",
                    "Harry Potter and the Half-Blood Prince",
                    "Harry Potter and the Deathly Hallows",
                ]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            }],
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            common_surnames: [
                "smith", "brown", "black", "white", "green", "young", "king", "wood", "hill",
                "stone", "rice", "gray", "grey", "little", "long", "strong", "rose", "may", "love",
                "star", "house", "bird",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_aliases: vec![TitleAlias {
                regional: "philosopher's stone".to_string(),
                canonical: "sorcerer's stone".to_string(),
            }],
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        let mappings = [
            ("juvenile fiction", "Children's Fiction"),
            ("juvenile nonfiction", "Children's Nonfiction"),
            ("young adult fiction", "Young Adult"),
            ("sf", "Science Fiction"),
            ("science-fiction", "Science Fiction"),
            ("fiction in english", "Fiction"),
            ("ya", "Young Adult"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            split_on_comma: true,
            split_on_ampersand: true,
            max_subjects: 15,
            protected: [
                "health & fitness",
                "health & wellness",
                "health & beauty",
                "mind & body",
                "body, mind & spirit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            denylist: [
                "accessible book",
                "protected daisy",
                "in library",
                "lending library",
                "overdrive",
                "large type books",
                "internet archive wishlist",
                "open library staff picks",
                "nyt:",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            mappings,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            backfill_original_dates: true,
            backfill_concurrency: 4,
            top_count: 1,
        }
    }
}

impl TimeoutConfig {
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_secs)
    }

    pub fn editions(&self) -> Duration {
        Duration::from_secs(self.editions_secs)
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl ShelfscopeConfig {
    /// Standard config file path: `~/.config/shelfscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SHELFSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        if t.search_secs == 0 || t.lookup_secs == 0 || t.editions_secs == 0 {
            return Err(CoreError::ConfigError(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.enrichment.backfill_concurrency == 0 {
            return Err(CoreError::ConfigError(
                "enrichment.backfill_concurrency must be positive".to_string(),
            ));
        }
        for rule in &self.planner.franchises {
            if rule.name.trim().is_empty() || rule.titles.is_empty() || rule.titles.len() > 9 {
                return Err(CoreError::ConfigError(format!(
                    "franchise '{}' needs a name and 1-9 titles",
                    rule.name
                )));
            }
        }
        Ok(())
    }
}
