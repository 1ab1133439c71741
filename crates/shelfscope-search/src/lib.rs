//! Shelfscope search: two-provider book search with merge, ranking and
//! edition listing.

pub mod backfill;
pub mod categories;
pub mod editions;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod fanout;
pub mod http;
pub mod identifiers;
pub mod planner;
pub mod ranking;
pub mod reconcile;
pub mod sources;
pub mod text;

pub use categories::CategoryNormalizer;
pub use engine::BookSearchEngine;
pub use enrichment::{EnrichmentHook, EnrichmentReport};
pub use error::{Result, SearchError};
pub use planner::{QueryPlanner, QueryTarget, SearchIntent};
pub use ranking::RelevanceRanker;
pub use sources::{CatalogProvider, EditionCatalog, PublicationLookup};
