use std::sync::Arc;
use std::time::{Duration, Instant};

use shelfscope_core::{CanonicalBook, ProviderTag};
use tracing::{debug, warn};

use crate::error::{Result, SearchError};
use crate::planner::SearchIntent;
use crate::sources::CatalogProvider;

/// What one provider contributed to a search. A failed provider has
/// `success == false`, no books, and the reason in `error`.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: ProviderTag,
    pub success: bool,
    pub books: Vec<CanonicalBook>,
    pub error: Option<String>,
}

impl ProviderOutcome {
    fn failed(provider: ProviderTag, reason: String) -> Self {
        Self {
            provider,
            success: false,
            books: Vec::new(),
            error: Some(reason),
        }
    }

    pub fn has_books(&self) -> bool {
        self.success && !self.books.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FanOut {
    /// Provider A; its records are upserted first.
    pub primary: ProviderOutcome,
    pub secondary: ProviderOutcome,
}

/// Runs both providers concurrently and contains their failures.
pub struct FanOutCoordinator {
    primary: Arc<dyn CatalogProvider>,
    secondary: Arc<dyn CatalogProvider>,
    timeout: Duration,
}

impl FanOutCoordinator {
    pub fn new(
        primary: Arc<dyn CatalogProvider>,
        secondary: Arc<dyn CatalogProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    /// Waits for both branches. Provider failures become failed outcomes;
    /// only internal faults are returned as `Err`.
    pub async fn run(&self, intent: &SearchIntent) -> Result<FanOut> {
        let (primary, secondary) = tokio::join!(
            call_provider(self.primary.as_ref(), intent, self.timeout),
            call_provider(self.secondary.as_ref(), intent, self.timeout),
        );
        Ok(FanOut {
            primary: primary?,
            secondary: secondary?,
        })
    }
}

async fn call_provider(
    provider: &dyn CatalogProvider,
    intent: &SearchIntent,
    timeout: Duration,
) -> Result<ProviderOutcome> {
    let tag = provider.tag();
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, provider.search(intent)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(books)) => {
            debug!(provider = %tag, count = books.len(), elapsed_ms, "provider finished");
            Ok(ProviderOutcome {
                provider: tag,
                success: true,
                books,
                error: None,
            })
        }
        Ok(Err(err)) if err.is_provider_failure() => {
            warn!(provider = %tag, error = %err, elapsed_ms, "provider failed");
            Ok(ProviderOutcome::failed(tag, err.to_string()))
        }
        Ok(Err(err)) => Err(err),
        Err(_) => {
            let err = SearchError::ProviderUnavailable {
                provider: tag,
                reason: format!("timed out after {}ms", timeout.as_millis()),
            };
            warn!(provider = %tag, error = %err, elapsed_ms, "provider timed out");
            Ok(ProviderOutcome::failed(tag, err.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use shelfscope_core::SearchType;

    use super::*;
    use crate::planner::QueryPlanner;

    /// In-process provider returning canned books, an error, or nothing in time.
    pub(crate) struct StubProvider {
        pub tag: ProviderTag,
        pub books: Vec<CanonicalBook>,
        pub delay: Option<Duration>,
        pub fail_with: Option<fn(ProviderTag) -> SearchError>,
    }

    impl StubProvider {
        pub(crate) fn returning(tag: ProviderTag, books: Vec<CanonicalBook>) -> Self {
            Self {
                tag,
                books,
                delay: None,
                fail_with: None,
            }
        }

        pub(crate) fn sleeping(tag: ProviderTag, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::returning(tag, Vec::new())
            }
        }

        pub(crate) fn failing(tag: ProviderTag, fail_with: fn(ProviderTag) -> SearchError) -> Self {
            Self {
                fail_with: Some(fail_with),
                ..Self::returning(tag, Vec::new())
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for StubProvider {
        fn tag(&self) -> ProviderTag {
            self.tag
        }

        async fn search(&self, _intent: &SearchIntent) -> Result<Vec<CanonicalBook>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.fail_with {
                Some(fail) => Err(fail(self.tag)),
                None => Ok(self.books.clone()),
            }
        }
    }

    pub(crate) fn books(tag: ProviderTag, titles: &[&str]) -> Vec<CanonicalBook> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| CanonicalBook::new(format!("{tag}-{i}"), *title, tag))
            .collect()
    }

    fn intent() -> SearchIntent {
        QueryPlanner::default().plan("dune", SearchType::General, 10)
    }

    #[tokio::test]
    async fn slow_provider_does_not_block_the_other() {
        let coordinator = FanOutCoordinator::new(
            Arc::new(StubProvider::sleeping(
                ProviderTag::GoogleBooks,
                Duration::from_secs(5),
            )),
            Arc::new(StubProvider::returning(
                ProviderTag::OpenLibrary,
                books(ProviderTag::OpenLibrary, &["Dune", "Dune Messiah"]),
            )),
            Duration::from_millis(50),
        );

        let fan_out = coordinator.run(&intent()).await.unwrap();
        assert!(!fan_out.primary.success);
        assert!(fan_out.primary.books.is_empty());
        assert!(fan_out.primary.error.as_deref().unwrap().contains("timed out"));
        assert!(fan_out.secondary.success);
        assert_eq!(fan_out.secondary.books.len(), 2);
    }

    #[tokio::test]
    async fn provider_errors_are_contained() {
        let coordinator = FanOutCoordinator::new(
            Arc::new(StubProvider::failing(ProviderTag::GoogleBooks, |provider| {
                SearchError::ProviderRateLimited {
                    provider,
                    retry_after_secs: 30,
                }
            })),
            Arc::new(StubProvider::returning(
                ProviderTag::OpenLibrary,
                books(ProviderTag::OpenLibrary, &["Dune"]),
            )),
            Duration::from_secs(1),
        );

        let fan_out = coordinator.run(&intent()).await.unwrap();
        assert!(!fan_out.primary.success);
        assert!(fan_out.secondary.has_books());
    }

    #[tokio::test]
    async fn internal_faults_propagate() {
        let coordinator = FanOutCoordinator::new(
            Arc::new(StubProvider::failing(ProviderTag::GoogleBooks, |_| {
                SearchError::Parse("bad base url".to_string())
            })),
            Arc::new(StubProvider::returning(ProviderTag::OpenLibrary, Vec::new())),
            Duration::from_secs(1),
        );

        assert!(matches!(
            coordinator.run(&intent()).await,
            Err(SearchError::Parse(_))
        ));
    }
}
