use std::sync::Arc;
use std::time::Instant;

use shelfscope_core::{
    EditionsResponse, ProviderTag, SearchRequest, SearchResponse, SearchSource, ShelfscopeConfig,
};
use tracing::{debug, info};

use crate::backfill::OriginalDateBackfill;
use crate::editions::EditionResolver;
use crate::enrichment::{EnrichmentHook, apply_enrichment};
use crate::error::{Result, SearchError};
use crate::fanout::{FanOut, FanOutCoordinator, ProviderOutcome};
use crate::planner::QueryPlanner;
use crate::ranking::RelevanceRanker;
use crate::reconcile::reconcile;
use crate::sources::{
    CatalogProvider, EditionCatalog, GoogleBooksSource, OpenLibrarySource, PublicationLookup,
};

/// Entry point for searches and edition listings.
pub struct BookSearchEngine {
    config: ShelfscopeConfig,
    planner: QueryPlanner,
    ranker: RelevanceRanker,
    fanout: FanOutCoordinator,
    backfill: Option<OriginalDateBackfill>,
    editions: EditionResolver,
    enrichment: Option<Arc<dyn EnrichmentHook>>,
}

impl BookSearchEngine {
    /// Engine backed by Google Books (provider A) and Open Library (provider B).
    pub fn new(config: ShelfscopeConfig) -> Result<Self> {
        let google = Arc::new(GoogleBooksSource::new(&config)?);
        let openlibrary = Arc::new(OpenLibrarySource::new(&config)?);
        Ok(Self::from_parts(
            config,
            google,
            openlibrary.clone(),
            openlibrary.clone(),
            openlibrary,
        ))
    }

    pub fn from_parts(
        config: ShelfscopeConfig,
        provider_a: Arc<dyn CatalogProvider>,
        provider_b: Arc<dyn CatalogProvider>,
        lookup: Arc<dyn PublicationLookup>,
        editions: Arc<dyn EditionCatalog>,
    ) -> Self {
        let backfill = config.enrichment.backfill_original_dates.then(|| {
            OriginalDateBackfill::new(
                lookup,
                &config.matching.title_aliases,
                config.enrichment.backfill_concurrency,
            )
        });
        Self {
            planner: QueryPlanner::new(&config.planner),
            ranker: RelevanceRanker::new(&config.ranking),
            fanout: FanOutCoordinator::new(provider_a, provider_b, config.timeouts.search()),
            backfill,
            editions: EditionResolver::new(editions),
            enrichment: None,
            config,
        }
    }

    pub fn with_enrichment(mut self, hook: Arc<dyn EnrichmentHook>) -> Self {
        self.enrichment = Some(hook);
        self
    }

    pub fn config(&self) -> &ShelfscopeConfig {
        &self.config
    }

    /// Plan, fan out, reconcile and rank, then backfill and enrich the ranked
    /// list according to `request.enrichment`.
    ///
    /// Provider failures never surface as `Err`; they show up as
    /// `success: false` or a narrower `source`.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        if request.max_results == 0 {
            return Err(SearchError::InvalidRequest(
                "max_results must be positive".to_string(),
            ));
        }
        if request.query.trim().is_empty() {
            return Ok(SearchResponse::no_results(false, "Query is empty"));
        }

        let started = Instant::now();
        let intent = self
            .planner
            .plan(&request.query, request.search_type, request.max_results);
        let FanOut { primary, secondary } = self.fanout.run(&intent).await?;

        let source = response_source(&primary, &secondary);
        let sources: Vec<ProviderTag> = [&primary, &secondary]
            .into_iter()
            .filter(|outcome| outcome.has_books())
            .map(|outcome| outcome.provider)
            .collect();

        if source == SearchSource::NoResults {
            let response = if !primary.success && !secondary.success {
                SearchResponse::no_results(false, failure_message(&[&primary, &secondary]))
            } else {
                SearchResponse::no_results(true, "No books found")
            };
            info!(
                query = %intent.query,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "search found nothing"
            );
            return Ok(response);
        }

        // Reasons from a provider that failed while the other succeeded.
        let message = [&primary, &secondary]
            .iter()
            .filter_map(|outcome| outcome.error.as_deref())
            .map(ToOwned::to_owned)
            .reduce(|a, b| format!("{a}; {b}"));

        let mut books = reconcile(primary.books, secondary.books, |book| {
            self.ranker.score(book, &intent.query)
        });
        books.truncate(request.max_results);

        // The ranked list is fixed from here on; later steps only fill fields.
        if let Some(backfill) = &self.backfill {
            backfill
                .backfill_ranked(
                    request.enrichment,
                    &mut books,
                    self.config.enrichment.top_count,
                    self.config.timeouts.lookup(),
                )
                .await;
        }

        if let Some(hook) = &self.enrichment {
            let report = apply_enrichment(
                hook.as_ref(),
                request.enrichment,
                &mut books,
                self.config.enrichment.top_count,
                self.config.enrichment.backfill_concurrency,
            )
            .await;
            debug!(
                attempted = report.attempted,
                enriched = report.enriched,
                errors = report.errors.len(),
                "enrichment finished"
            );
        }

        info!(
            query = %intent.query,
            source = ?source,
            count = books.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(SearchResponse {
            success: true,
            total_items: books.len(),
            books,
            source,
            sources,
            message,
        })
    }

    pub async fn get_editions(
        &self,
        work_id: &str,
        limit: usize,
        english_only: bool,
        original_title: Option<&str>,
    ) -> Result<EditionsResponse> {
        self.editions
            .resolve(work_id, limit, english_only, original_title)
            .await
    }
}

fn response_source(primary: &ProviderOutcome, secondary: &ProviderOutcome) -> SearchSource {
    match (primary.has_books(), secondary.has_books()) {
        (true, true) => SearchSource::MergedApis,
        (true, false) => SearchSource::GoogleBooksEnhanced,
        (false, true) => SearchSource::OpenLibraryPrimary,
        (false, false) => SearchSource::NoResults,
    }
}

fn failure_message(outcomes: &[&ProviderOutcome]) -> String {
    let reasons: Vec<String> = outcomes
        .iter()
        .map(|o| match &o.error {
            Some(err) => err.clone(),
            None => format!("{} returned nothing", o.provider),
        })
        .collect();
    format!("All providers failed: {}", reasons.join("; "))
}
