use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use serde_json::Value;
use shelfscope_core::{CanonicalBook, EditionRecord, ProviderTag, ShelfscopeConfig, parse_year};
use tracing::debug;

use crate::categories::CategoryNormalizer;
use crate::error::{Result, SearchError};
use crate::http::{ProviderHttp, endpoint};
use crate::identifiers::pick_isbns;
use crate::planner::{QueryTarget, SearchIntent};
use crate::sources::language::display_language;
use crate::sources::{CatalogProvider, EditionCatalog, PublicationCandidate, PublicationLookup};

const SEARCH_FIELDS: &str = "key,title,subtitle,author_name,publisher,first_publish_year,\
isbn,number_of_pages_median,subject,language,cover_i,edition_count,ratings_average,ratings_count";
const LOOKUP_FIELDS: &str = "key,title,author_name,first_publish_year";
const LOOKUP_LIMIT: usize = 5;
const MAX_PAGE_SIZE: usize = 100;
const SIDECAR_SUBJECTS: usize = 10;
const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";
const AUTHOR_LOOKUP_CONCURRENCY: usize = 4;
const WORKS_URL: &str = "https://openlibrary.org/works";

/// Adapter for the Open Library search, works and editions endpoints.
pub struct OpenLibrarySource {
    http: ProviderHttp,
    base_url: String,
    search_timeout: Duration,
    lookup_timeout: Duration,
    editions_timeout: Duration,
    categories: CategoryNormalizer,
    max_subjects: usize,
}

impl OpenLibrarySource {
    pub fn new(config: &ShelfscopeConfig) -> Result<Self> {
        Self::with_base_url(&config.providers.open_library_url, config)
    }

    pub fn with_base_url(base_url: &str, config: &ShelfscopeConfig) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(ProviderTag::OpenLibrary, &config.providers.user_agent)?,
            base_url: base_url.to_string(),
            search_timeout: config.timeouts.search(),
            lookup_timeout: config.timeouts.lookup(),
            editions_timeout: config.timeouts.editions(),
            categories: CategoryNormalizer::new(&config.categories),
            max_subjects: config.categories.max_subjects,
        })
    }

    fn search_url(&self, params: &[(&str, &str)], fields: &str, limit: usize) -> Result<Url> {
        let mut url = endpoint(&self.base_url, &["search.json"])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs
                .append_pair("limit", &limit.to_string())
                .append_pair("fields", fields);
        }
        Ok(url)
    }

    fn search_params(target: &QueryTarget) -> Vec<(&'static str, &str)> {
        match target {
            QueryTarget::Isbn(isbn) => vec![("isbn", isbn.as_str())],
            QueryTarget::Title(title) => vec![("title", title.as_str())],
            QueryTarget::Author(author) => vec![("author", author.as_str())],
            QueryTarget::AuthorTitle { author, title, .. } => {
                vec![("title", title.as_str()), ("author", author.as_str())]
            }
            QueryTarget::FreeText(text) => vec![("q", text.as_str())],
        }
    }

    pub fn doc_to_book(&self, doc: &Value) -> Option<CanonicalBook> {
        let title = str_field(doc, "title")?;
        let work_key = doc
            .get("key")
            .and_then(Value::as_str)
            .and_then(bare_work_key);
        let id = work_key.clone().unwrap_or_else(|| title.clone());

        let mut book = CanonicalBook::new(id, title, ProviderTag::OpenLibrary);
        book.subtitle = str_field(doc, "subtitle");
        book.authors = string_array(doc.get("author_name"));
        book.publisher = string_array(doc.get("publisher")).into_iter().next();
        book.original_published_date = doc
            .get("first_publish_year")
            .and_then(Value::as_i64)
            .map(|year| year.to_string());
        book.page_count = doc
            .get("number_of_pages_median")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0);
        book.thumbnail = doc
            .get("cover_i")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .map(|id| format!("{COVERS_URL}/{id}-L.jpg"));
        book.info_link = work_key.as_ref().map(|key| format!("{WORKS_URL}/{key}"));
        book.language = string_array(doc.get("language"))
            .first()
            .and_then(|tag| display_language(tag));
        book.average_rating = doc
            .get("ratings_average")
            .and_then(Value::as_f64)
            .map(|r| r as f32);
        book.ratings_count = doc
            .get("ratings_count")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        let isbns = string_array(doc.get("isbn"));
        let (isbn13, isbn10) = pick_isbns(isbns.iter().map(String::as_str));
        book.isbn13 = isbn13;
        book.isbn10 = isbn10;

        let subjects = string_array(doc.get("subject"));
        book.add_categories(
            self.categories
                .normalize(subjects.iter().take(self.max_subjects)),
        );

        book.provider_data.work_key = work_key;
        book.provider_data.subjects = subjects.into_iter().take(SIDECAR_SUBJECTS).collect();
        book.provider_data.edition_count = doc
            .get("edition_count")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        Some(book)
    }

    pub fn edition_from_json(&self, v: &Value) -> Option<EditionRecord> {
        let key = v.get("key").and_then(Value::as_str)?;
        let title = str_field(v, "title")?;

        let published_date = str_field(v, "publish_date").map(|date| match parse_year(&date) {
            Some(year) => year.to_string(),
            None => date,
        });

        let isbns: Vec<String> = string_array(v.get("isbn_13"))
            .into_iter()
            .chain(string_array(v.get("isbn_10")))
            .collect();
        let (isbn13, isbn10) = pick_isbns(isbns.iter().map(String::as_str));

        let languages = v
            .get("languages")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| {
                        item.get("key")
                            .and_then(Value::as_str)
                            .or_else(|| item.as_str())
                    })
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let description = match v.get("description") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(obj) => obj.get("value").and_then(Value::as_str).map(ToOwned::to_owned),
            None => None,
        };

        let cover = v
            .get("covers")
            .and_then(Value::as_array)
            .and_then(|arr| arr.iter().filter_map(Value::as_i64).find(|id| *id > 0))
            .map(|id| format!("{COVERS_URL}/{id}-L.jpg"));

        let subjects = string_array(v.get("subjects"));

        Some(EditionRecord {
            key: key.trim_start_matches("/books/").to_string(),
            title,
            subtitle: str_field(v, "subtitle"),
            authors: v
                .get("authors")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|a| a.get("name").and_then(Value::as_str))
                        .map(ToOwned::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            publisher: string_array(v.get("publishers")).into_iter().next(),
            published_date,
            isbn13,
            isbn10,
            page_count: v
                .get("number_of_pages")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0),
            format: str_field(v, "physical_format"),
            dimensions: str_field(v, "physical_dimensions"),
            cover,
            description,
            categories: self
                .categories
                .normalize(subjects.iter().take(self.max_subjects)),
            languages,
        })
    }

    /// Edition entries reference authors by key only; resolve each distinct
    /// key once. Keys that fail to resolve are skipped.
    async fn author_names<'a, I>(&self, keys: I) -> HashMap<String, String>
    where
        I: Iterator<Item = &'a String>,
    {
        let distinct: BTreeSet<&String> = keys.collect();
        futures::stream::iter(distinct.into_iter().cloned())
            .map(|key: String| async move {
                let found = self.author_name(&key).await;
                (key, found)
            })
            .buffer_unordered(AUTHOR_LOOKUP_CONCURRENCY)
            .filter_map(|(key, found)| async move {
                match found {
                    Ok(name) => name.map(|name| (key, name)),
                    Err(err) => {
                        debug!(author = %key, error = %err, "author lookup failed");
                        None
                    }
                }
            })
            .collect()
            .await
    }

    async fn author_name(&self, key: &str) -> Result<Option<String>> {
        let url = endpoint(&self.base_url, &["authors", &format!("{key}.json")])?;
        let json = self.http.get_json_optional(&url, self.lookup_timeout).await?;
        Ok(json.as_ref().and_then(|author| str_field(author, "name")))
    }

    async fn lookup(&self, params: &[(&str, &str)]) -> Result<Vec<PublicationCandidate>> {
        let url = self.search_url(params, LOOKUP_FIELDS, LOOKUP_LIMIT)?;
        let json = self.http.get_json(&url, self.lookup_timeout).await?;
        Ok(docs(&json)
            .iter()
            .filter_map(|doc| {
                Some(PublicationCandidate {
                    title: str_field(doc, "title")?,
                    authors: string_array(doc.get("author_name")),
                    first_publish_year: doc
                        .get("first_publish_year")
                        .and_then(Value::as_i64)
                        .and_then(|y| i32::try_from(y).ok()),
                    work_key: doc
                        .get("key")
                        .and_then(Value::as_str)
                        .and_then(bare_work_key),
                })
            })
            .collect())
    }
}

#[async_trait]
impl CatalogProvider for OpenLibrarySource {
    fn tag(&self) -> ProviderTag {
        ProviderTag::OpenLibrary
    }

    async fn search(&self, intent: &SearchIntent) -> Result<Vec<CanonicalBook>> {
        let params = Self::search_params(&intent.target);
        let limit = intent.max_results.clamp(1, MAX_PAGE_SIZE);
        let url = self.search_url(&params, SEARCH_FIELDS, limit)?;

        let json = self.http.get_json(&url, self.search_timeout).await?;
        let books: Vec<CanonicalBook> = docs(&json)
            .iter()
            .filter_map(|doc| self.doc_to_book(doc))
            .collect();

        debug!(count = books.len(), "open library results");
        Ok(books)
    }
}

#[async_trait]
impl PublicationLookup for OpenLibrarySource {
    async fn lookup_by_title(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<PublicationCandidate>> {
        let mut params = vec![("title", title)];
        if let Some(author) = author {
            params.push(("author", author));
        }
        self.lookup(&params).await
    }

    async fn lookup_by_isbn(&self, isbn: &str) -> Result<Vec<PublicationCandidate>> {
        self.lookup(&[("isbn", isbn)]).await
    }
}

#[async_trait]
impl EditionCatalog for OpenLibrarySource {
    async fn fetch_editions(&self, work_key: &str, limit: usize) -> Result<Vec<EditionRecord>> {
        let mut url = endpoint(&self.base_url, &["works", work_key, "editions.json"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.max(1).to_string());

        let Some(json) = self.http.get_json_optional(&url, self.editions_timeout).await? else {
            return Err(SearchError::WorkNotFound(work_key.to_string()));
        };
        let parsed: Vec<(EditionRecord, Vec<String>)> = json
            .get("entries")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| Some((self.edition_from_json(entry)?, author_keys(entry))))
                    .collect()
            })
            .unwrap_or_default();

        let names = self
            .author_names(parsed.iter().flat_map(|(_, keys)| keys.iter()))
            .await;
        Ok(parsed
            .into_iter()
            .map(|(mut edition, keys)| {
                if edition.authors.is_empty() {
                    edition.authors = keys.iter().filter_map(|k| names.get(k).cloned()).collect();
                }
                edition
            })
            .collect())
    }
}

/// `/works/OL45804W`, `OL45804W` or a full works URL -> `OL45804W`.
pub fn bare_work_key(raw: &str) -> Option<String> {
    let key = raw
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    (!key.is_empty()).then(|| key.to_string())
}

fn docs(json: &Value) -> &[Value] {
    json.get("docs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// `authors: [{"key": "/authors/OL26320A"}]`, or the `{"author": {"key"}}` form works use.
fn author_keys(v: &Value) -> Vec<String> {
    v.get("authors")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    a.get("key")
                        .or_else(|| a.get("author").and_then(|inner| inner.get("key")))
                        .and_then(Value::as_str)
                })
                .filter_map(|key| key.rsplit('/').next())
                .filter(|key| !key.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts an array of strings or a single string.
fn string_array(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;
    use shelfscope_core::SearchType;

    use super::*;
    use crate::planner::QueryPlanner;

    fn source(base_url: &str) -> OpenLibrarySource {
        OpenLibrarySource::with_base_url(base_url, &ShelfscopeConfig::default()).unwrap()
    }

    fn hobbit_doc() -> Value {
        json!({
            "key": "/works/OL262758W",
            "title": "The Hobbit",
            "author_name": ["J.R.R. Tolkien"],
            "publisher": ["Allen & Unwin", "Houghton Mifflin"],
            "first_publish_year": 1937,
            "isbn": ["9780261102217", "0261102214"],
            "number_of_pages_median": 310,
            "subject": [
                "Fantasy fiction",
                "Accessible book",
                "Juvenile fiction",
                "Protected DAISY"
            ],
            "language": ["eng"],
            "cover_i": 6979861,
            "edition_count": 470
        })
    }

    #[test]
    fn parses_search_doc() {
        let book = source("http://localhost").doc_to_book(&hobbit_doc()).unwrap();

        assert_eq!(book.id, "OL262758W");
        assert_eq!(book.original_published_date.as_deref(), Some("1937"));
        assert_eq!(book.edition_published_date, None);
        assert_eq!(book.publisher.as_deref(), Some("Allen & Unwin"));
        assert_eq!(book.isbn13.as_deref(), Some("9780261102217"));
        assert_eq!(book.isbn10.as_deref(), Some("0261102214"));
        assert_eq!(
            book.thumbnail.as_deref(),
            Some("https://covers.openlibrary.org/b/id/6979861-L.jpg")
        );
        assert_eq!(
            book.info_link.as_deref(),
            Some("https://openlibrary.org/works/OL262758W")
        );
        assert_eq!(book.language.as_deref(), Some("English"));
        assert_eq!(book.categories, vec!["Fantasy Fiction", "Children's Fiction"]);
        assert_eq!(book.provider_data.work_key.as_deref(), Some("OL262758W"));
        assert_eq!(book.provider_data.subjects.len(), 4);
        assert_eq!(book.provider_data.edition_count, Some(470));
    }

    #[test]
    fn work_keys_are_normalized() {
        for raw in [
            "OL45804W",
            "/works/OL45804W",
            "https://openlibrary.org/works/OL45804W",
        ] {
            assert_eq!(bare_work_key(raw).as_deref(), Some("OL45804W"));
        }
        assert_eq!(bare_work_key("  "), None);
    }

    #[test]
    fn parses_edition_entry() {
        let entry = json!({
            "key": "/books/OL7353617M",
            "title": "The Hobbit",
            "publishers": ["Houghton Mifflin"],
            "publish_date": "September 1999",
            "isbn_13": ["9780618002214"],
            "number_of_pages": 330,
            "physical_format": "Paperback",
            "physical_dimensions": "20 x 13 x 2 centimeters",
            "covers": [-1, 8406786],
            "description": {"type": "/type/text", "value": "In a hole in the ground..."},
            "languages": [{"key": "/languages/eng"}]
        });

        let edition = source("http://localhost").edition_from_json(&entry).unwrap();
        assert_eq!(edition.key, "OL7353617M");
        assert_eq!(edition.published_date.as_deref(), Some("1999"));
        assert_eq!(edition.isbn13.as_deref(), Some("9780618002214"));
        assert_eq!(edition.format.as_deref(), Some("Paperback"));
        assert_eq!(
            edition.cover.as_deref(),
            Some("https://covers.openlibrary.org/b/id/8406786-L.jpg")
        );
        assert_eq!(edition.description.as_deref(), Some("In a hole in the ground..."));
        assert_eq!(edition.languages, vec!["/languages/eng"]);
    }

    #[tokio::test]
    async fn search_sends_structured_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("title".to_string(), "the hobbit".to_string()),
                Matcher::UrlEncoded("author".to_string(), "j. r. r. tolkien".to_string()),
                Matcher::UrlEncoded("limit".to_string(), "10".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"numFound": 1, "docs": [hobbit_doc()]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let intent =
            QueryPlanner::default().plan("the hobbit j. r. r. tolkien", SearchType::General, 10);
        let books = source(&server.url()).search(&intent).await.unwrap();

        mock.assert_async().await;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "The Hobbit");
    }

    #[tokio::test]
    async fn isbn_lookup_returns_candidates() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/search.json")
            .match_query(Matcher::UrlEncoded(
                "isbn".to_string(),
                "9780261102217".to_string(),
            ))
            .with_status(200)
            .with_body(
                json!({"docs": [{
                    "key": "/works/OL262758W",
                    "title": "The Hobbit",
                    "author_name": ["J.R.R. Tolkien"],
                    "first_publish_year": 1937
                }]})
                .to_string(),
            )
            .create_async()
            .await;

        let found = source(&server.url())
            .lookup_by_isbn("9780261102217")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_publish_year, Some(1937));
        assert_eq!(found[0].work_key.as_deref(), Some("OL262758W"));
    }

    #[tokio::test]
    async fn unknown_work_is_work_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/OL0W/editions.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = source(&server.url())
            .fetch_editions("OL0W", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::WorkNotFound(key) if key == "OL0W"));
    }

    #[tokio::test]
    async fn editions_are_parsed_from_entries() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/OL262758W/editions.json")
            .match_query(Matcher::UrlEncoded("limit".to_string(), "6".to_string()))
            .with_status(200)
            .with_body(
                json!({"size": 2, "entries": [
                    {"key": "/books/OL1M", "title": "The Hobbit", "publish_date": "1966"},
                    {"key": "/books/OL2M"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let editions = source(&server.url())
            .fetch_editions("OL262758W", 6)
            .await
            .unwrap();
        assert_eq!(editions.len(), 1);
        assert_eq!(editions[0].key, "OL1M");
    }

    #[tokio::test]
    async fn edition_author_keys_resolve_to_names() {
        let mut server = Server::new_async().await;
        let _editions = server
            .mock("GET", "/works/OL262758W/editions.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"entries": [
                    {"key": "/books/OL1M", "title": "The Hobbit",
                     "authors": [{"key": "/authors/OL26320A"}]},
                    {"key": "/books/OL2M", "title": "The Hobbit",
                     "authors": [{"key": "/authors/OL26320A"}, {"key": "/authors/OL9A"}]}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let tolkien = server
            .mock("GET", "/authors/OL26320A.json")
            .with_status(200)
            .with_body(json!({"key": "/authors/OL26320A", "name": "J.R.R. Tolkien"}).to_string())
            .expect(1)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/authors/OL9A.json")
            .with_status(503)
            .create_async()
            .await;

        let editions = source(&server.url())
            .fetch_editions("OL262758W", 4)
            .await
            .unwrap();

        tolkien.assert_async().await;
        assert_eq!(editions[0].authors, vec!["J.R.R. Tolkien"]);
        assert_eq!(editions[1].authors, vec!["J.R.R. Tolkien"]);
    }
}
