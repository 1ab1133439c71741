use shelfscope_core::ProviderTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: ProviderTag, reason: String },

    #[error("rate limit from {provider}, retry after {retry_after_secs}s")]
    ProviderRateLimited {
        provider: ProviderTag,
        retry_after_secs: u64,
    },

    #[error("{provider} rejected the query: {message}")]
    ProviderBadRequest { provider: ProviderTag, message: String },

    #[error("work not found: {0}")]
    WorkNotFound(String),

    #[error("invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SearchError {
    /// Failures local to one provider call. The fan-out and backfill swallow
    /// these; anything else is an internal fault.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::ProviderRateLimited { .. }
                | Self::ProviderBadRequest { .. }
                | Self::WorkNotFound(_)
                | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
