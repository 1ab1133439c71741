use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shelfscope_core::{CanonicalBook, ProviderTag, ShelfscopeConfig};
use tracing::debug;

use crate::categories::CategoryNormalizer;
use crate::error::Result;
use crate::http::{ProviderHttp, endpoint};
use crate::identifiers::pick_isbns;
use crate::planner::{QueryTarget, SearchIntent};
use crate::sources::CatalogProvider;
use crate::sources::language::display_language;

const MAX_PAGE_SIZE: usize = 40;
const IMAGE_SIZES: &[&str] = &[
    "extraLarge",
    "large",
    "medium",
    "small",
    "thumbnail",
    "smallThumbnail",
];

/// Adapter for the Google Books volumes API.
pub struct GoogleBooksSource {
    http: ProviderHttp,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    categories: CategoryNormalizer,
    max_subjects: usize,
}

impl GoogleBooksSource {
    pub fn new(config: &ShelfscopeConfig) -> Result<Self> {
        let api_key = std::env::var(&config.providers.google_books_api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::with_params(&config.providers.google_books_url, api_key, config)
    }

    pub fn with_params(
        base_url: &str,
        api_key: Option<String>,
        config: &ShelfscopeConfig,
    ) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(ProviderTag::GoogleBooks, &config.providers.user_agent)?,
            base_url: base_url.to_string(),
            api_key,
            timeout: config.timeouts.search(),
            categories: CategoryNormalizer::new(&config.categories),
            max_subjects: config.categories.max_subjects,
        })
    }

    /// Render an intent in Google's `q` syntax.
    pub fn render_query(target: &QueryTarget) -> String {
        match target {
            QueryTarget::Isbn(isbn) => format!("isbn:{isbn}"),
            QueryTarget::Title(title) => format!("intitle:{title}"),
            QueryTarget::Author(author) => format!("inauthor:{author}"),
            QueryTarget::AuthorTitle {
                author,
                title,
                exact: true,
            } => format!("intitle:\"{title}\" inauthor:\"{author}\""),
            QueryTarget::AuthorTitle { author, title, .. } => {
                format!("intitle:{title} inauthor:{author}")
            }
            QueryTarget::FreeText(text) => text.clone(),
        }
    }

    pub fn volume_from_json(&self, v: &Value) -> Option<CanonicalBook> {
        let id = v.get("id").and_then(Value::as_str)?;
        let info = v.get("volumeInfo")?;
        let title = str_field(info, "title")?;

        let mut book = CanonicalBook::new(id, title, ProviderTag::GoogleBooks);
        book.subtitle = str_field(info, "subtitle");
        book.authors = string_array(info.get("authors"));
        book.publisher = str_field(info, "publisher");
        book.edition_published_date = str_field(info, "publishedDate");
        book.description = str_field(info, "description");
        book.page_count = info
            .get("pageCount")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0);
        book.language = info
            .get("language")
            .and_then(Value::as_str)
            .and_then(display_language);
        book.thumbnail = best_image(info.get("imageLinks"));
        book.info_link = str_field(info, "infoLink").map(|url| upgrade_to_https(&url));
        book.average_rating = info
            .get("averageRating")
            .and_then(Value::as_f64)
            .map(|r| r as f32);
        book.ratings_count = info
            .get("ratingsCount")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        let identifiers: Vec<&str> = info
            .get("industryIdentifiers")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        matches!(
                            id.get("type").and_then(Value::as_str),
                            Some("ISBN_13" | "ISBN_10")
                        )
                    })
                    .filter_map(|id| id.get("identifier").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let (isbn13, isbn10) = pick_isbns(identifiers);
        book.isbn13 = isbn13;
        book.isbn10 = isbn10;

        let raw_categories = string_array(info.get("categories"));
        book.add_categories(
            self.categories
                .normalize(raw_categories.iter().take(self.max_subjects)),
        );

        Some(book)
    }
}

#[async_trait]
impl CatalogProvider for GoogleBooksSource {
    fn tag(&self) -> ProviderTag {
        ProviderTag::GoogleBooks
    }

    async fn search(&self, intent: &SearchIntent) -> Result<Vec<CanonicalBook>> {
        let mut url = endpoint(&self.base_url, &["volumes"])?;
        let page_size = intent.max_results.clamp(1, MAX_PAGE_SIZE);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &Self::render_query(&intent.target))
                .append_pair("maxResults", &page_size.to_string())
                .append_pair("printType", "books");
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }

        let json = self.http.get_json(&url, self.timeout).await?;
        let books: Vec<CanonicalBook> = json
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| self.volume_from_json(item))
                    .collect()
            })
            .unwrap_or_default();

        debug!(count = books.len(), "google books results");
        Ok(books)
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn string_array(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn best_image(links: Option<&Value>) -> Option<String> {
    let links = links?;
    IMAGE_SIZES
        .iter()
        .find_map(|size| links.get(*size).and_then(Value::as_str))
        .map(|url| upgrade_to_https(&url.replace("&edge=curl", "")))
}

fn upgrade_to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;
    use shelfscope_core::SearchType;

    use super::*;
    use crate::planner::QueryPlanner;

    fn source(base_url: &str) -> GoogleBooksSource {
        GoogleBooksSource::with_params(base_url, None, &ShelfscopeConfig::default()).unwrap()
    }

    fn hail_mary_volume() -> Value {
        json!({
            "id": "gb-phm",
            "volumeInfo": {
                "title": "Project Hail Mary",
                "authors": ["Andy Weir"],
                "publisher": "Ballantine Books",
                "publishedDate": "2021-05-04",
                "pageCount": 496,
                "categories": ["Fiction / Science Fiction / Space Opera"],
                "language": "en",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "0593135202"},
                    {"type": "ISBN_13", "identifier": "9780593135204"},
                    {"type": "OTHER", "identifier": "UOM:39015"}
                ],
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/small&edge=curl",
                    "thumbnail": "http://books.google.com/thumb&edge=curl"
                },
                "infoLink": "http://books.google.com/books?id=gb-phm",
                "averageRating": 4.5,
                "ratingsCount": 120
            }
        })
    }

    #[test]
    fn maps_volume_fields() {
        let book = source("http://localhost")
            .volume_from_json(&hail_mary_volume())
            .unwrap();

        assert_eq!(book.id, "gb-phm");
        assert_eq!(book.authors, vec!["Andy Weir"]);
        assert_eq!(book.isbn13.as_deref(), Some("9780593135204"));
        assert_eq!(book.isbn10.as_deref(), Some("0593135202"));
        assert_eq!(book.page_count, Some(496));
        assert_eq!(book.language.as_deref(), Some("English"));
        assert_eq!(
            book.thumbnail.as_deref(),
            Some("https://books.google.com/thumb")
        );
        assert_eq!(
            book.info_link.as_deref(),
            Some("https://books.google.com/books?id=gb-phm")
        );
        assert_eq!(book.categories, vec!["Fiction", "Science Fiction", "Space Opera"]);
        assert_eq!(book.original_published_date, None);
    }

    #[test]
    fn volume_without_title_is_skipped() {
        let v = json!({"id": "x", "volumeInfo": {"authors": ["Nobody"]}});
        assert!(source("http://localhost").volume_from_json(&v).is_none());
    }

    #[test]
    fn renders_structured_queries() {
        assert_eq!(
            GoogleBooksSource::render_query(&QueryTarget::Isbn("9780593135204".into())),
            "isbn:9780593135204"
        );
        assert_eq!(
            GoogleBooksSource::render_query(&QueryTarget::AuthorTitle {
                author: "andy weir".into(),
                title: "project hail mary".into(),
                exact: false,
            }),
            "intitle:project hail mary inauthor:andy weir"
        );
    }

    #[tokio::test]
    async fn search_queries_volumes_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".to_string(),
                    "intitle:project hail mary inauthor:andy weir".to_string(),
                ),
                Matcher::UrlEncoded("maxResults".to_string(), "5".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"totalItems": 1, "items": [hail_mary_volume()]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let intent = QueryPlanner::default().plan(
            "andy weir project hail mary",
            SearchType::General,
            5,
        );
        let books = source(&server.url()).search(&intent).await.unwrap();

        mock.assert_async().await;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Project Hail Mary");
    }

    #[tokio::test]
    async fn zero_results_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"kind":"books#volumes","totalItems":0}"#)
            .create_async()
            .await;

        let intent = QueryPlanner::default().plan("zzzz", SearchType::General, 5);
        let books = source(&server.url()).search(&intent).await.unwrap();
        assert!(books.is_empty());
    }
}
