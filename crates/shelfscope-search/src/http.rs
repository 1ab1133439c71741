use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use shelfscope_core::ProviderTag;
use tracing::debug;

use crate::error::{Result, SearchError};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ─── ProviderHttp ─────────────────────────────────────────────────────────────

/// One provider's HTTP client. Every call carries an explicit timeout and
/// failures are classified into the provider error taxonomy; nothing is
/// retried or cached here.
#[derive(Clone)]
pub struct ProviderHttp {
    client: reqwest::Client,
    provider: ProviderTag,
}

impl ProviderHttp {
    pub fn new(provider: ProviderTag, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, provider })
    }

    pub async fn get_json(&self, url: &Url, timeout: Duration) -> Result<Value> {
        match self.get_json_optional(url, timeout).await? {
            Some(value) => Ok(value),
            None => Err(SearchError::ProviderUnavailable {
                provider: self.provider,
                reason: format!("HTTP 404 for {}", url.path()),
            }),
        }
    }

    /// Like [`get_json`](Self::get_json) but a 404 yields `Ok(None)`.
    pub async fn get_json_optional(&self, url: &Url, timeout: Duration) -> Result<Option<Value>> {
        debug!(provider = %self.provider, url = %url, "provider request");
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e, timeout))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(SearchError::ProviderRateLimited {
                provider: self.provider,
                retry_after_secs,
            });
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = resp.text().await.unwrap_or_default();
            return Err(SearchError::ProviderBadRequest {
                provider: self.provider,
                message: format!("HTTP {}: {}", status.as_u16(), truncate(&message, 200)),
            });
        }
        if !status.is_success() {
            return Err(SearchError::ProviderUnavailable {
                provider: self.provider,
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(e, timeout))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| SearchError::ProviderUnavailable {
                provider: self.provider,
                reason: format!("malformed response: {e}"),
            })
    }

    fn transport_error(&self, err: reqwest::Error, timeout: Duration) -> SearchError {
        let reason = if err.is_timeout() {
            format!("timed out after {}ms", timeout.as_millis())
        } else {
            err.to_string()
        };
        SearchError::ProviderUnavailable {
            provider: self.provider,
            reason,
        }
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| SearchError::Parse(format!("invalid URL {base_url}: {e}")))
}

/// Append path segments to a base URL, keeping any path prefix it already has.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = parse_base_url(base_url)?;
    {
        let mut segs = url
            .path_segments_mut()
            .map_err(|_| SearchError::Parse(format!("URL cannot be a base: {base_url}")))?;
        segs.pop_if_empty();
        for segment in segments {
            segs.push(segment);
        }
    }
    Ok(url)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn http() -> ProviderHttp {
        ProviderHttp::new(ProviderTag::GoogleBooks, "shelfscope-test").unwrap()
    }

    #[tokio::test]
    async fn ok_body_is_decoded() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .with_status(200)
            .with_body(r#"{"totalItems":0}"#)
            .create_async()
            .await;

        let url = endpoint(&server.url(), &["volumes"]).unwrap();
        let value = http().get_json(&url, TIMEOUT).await.unwrap();
        assert_eq!(value["totalItems"], 0);
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let url = endpoint(&server.url(), &["volumes"]).unwrap();
        let err = http().get_json(&url, TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::ProviderRateLimited {
                retry_after_secs: 7,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bad_request_and_server_errors_are_classified() {
        let mut server = Server::new_async().await;
        let _bad = server
            .mock("GET", "/bad")
            .with_status(400)
            .with_body("invalid q")
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let client = http();
        let bad = endpoint(&server.url(), &["bad"]).unwrap();
        let down = endpoint(&server.url(), &["down"]).unwrap();

        assert!(matches!(
            client.get_json(&bad, TIMEOUT).await,
            Err(SearchError::ProviderBadRequest { .. })
        ));
        assert!(matches!(
            client.get_json(&down, TIMEOUT).await,
            Err(SearchError::ProviderUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let url = endpoint(&server.url(), &["volumes"]).unwrap();
        let err = http().get_json(&url, TIMEOUT).await.unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn not_found_is_none_for_optional_lookups() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/OL1W/editions.json")
            .with_status(404)
            .create_async()
            .await;

        let url = endpoint(&server.url(), &["works", "OL1W", "editions.json"]).unwrap();
        assert!(http().get_json_optional(&url, TIMEOUT).await.unwrap().is_none());
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = endpoint("https://www.googleapis.com/books/v1", &["volumes"]).unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/books/v1/volumes");
    }
}
