//! Paginated image-search API client.
//!
//! One `search` call issues one page request against the Custom Search JSON
//! endpoint. Transient failures are retried with linearly increasing backoff;
//! once the attempts are spent the page degrades to "no items", which callers
//! treat as the end of pagination for that query. The endpoint is injectable
//! so tests can stand in a local HTTP double.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::harvest::config_loader::{AppConfig, SearchConfig};

/// Production endpoint of the Custom Search JSON API.
pub const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Error types for page requests
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: HTTP {0}")]
    Api(reqwest::StatusCode),
}

/// Result type for page requests
pub type SearchResult<T> = Result<T, SearchError>;

/// One candidate result; only the source link survives past the page.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub link: String,
}

/// Page body as returned by the API. The `items` field is absent past the
/// last page of a query, which deserializes to an empty batch.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

/// Client for the paginated image-search API.
pub struct SearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    page_size: u32,
    retry_attempts: u32,
    retry_base: Duration,
    retry_increment: Duration,
}

impl SearchClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        app_config: &AppConfig,
        search_config: &SearchConfig,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: search_config.auth.api_key.clone(),
            engine_id: search_config.auth.engine_id.clone(),
            page_size: app_config.limits.page_size,
            retry_attempts: app_config.rate.retry_attempts,
            retry_base: Duration::from_secs(app_config.rate.retry_base_secs),
            retry_increment: Duration::from_secs(app_config.rate.retry_increment_secs),
        }
    }

    /// Client against the production endpoint.
    pub fn from_config(client: Client, app_config: &AppConfig, search_config: &SearchConfig) -> Self {
        Self::new(client, SEARCH_ENDPOINT, app_config, search_config)
    }

    /// Fetches one result page at the given 1-based offset. Failed attempts
    /// are retried with backoff `base + attempt * increment`; when the retry
    /// budget is spent the page is reported as empty rather than failing the
    /// caller; an empty page means "stop paginating this query".
    pub async fn search(&self, query: &str, start_index: u32) -> Vec<SearchItem> {
        for attempt in 0..self.retry_attempts {
            match self.request_page(query, start_index).await {
                Ok(items) => {
                    debug!(
                        "'{}' start {} returned {} items",
                        query,
                        start_index,
                        items.len()
                    );
                    return items;
                }
                Err(e) => {
                    warn!(
                        "Search request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.retry_attempts,
                        e
                    );
                    if attempt + 1 < self.retry_attempts {
                        let backoff = self.retry_base + self.retry_increment * attempt;
                        sleep(backoff).await;
                    }
                }
            }
        }

        warn!(
            "Search retries exhausted for '{}' at start {}, treating page as empty",
            query, start_index
        );
        Vec::new()
    }

    async fn request_page(&self, query: &str, start_index: u32) -> SearchResult<Vec<SearchItem>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
            ])
            .query(&[("num", self.page_size), ("start", start_index)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Api(response.status()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::harvest::config_loader::Auth;

    fn test_client(endpoint: &str) -> SearchClient {
        let mut app_config = AppConfig::default();
        // Keep test backoffs short.
        app_config.rate.retry_base_secs = 0;
        app_config.rate.retry_increment_secs = 0;

        let mut search_config = SearchConfig::default();
        search_config.auth = Auth {
            api_key: "test-key".to_string(),
            engine_id: "test-engine".to_string(),
        };

        SearchClient::new(Client::new(), endpoint, &app_config, &search_config)
    }

    #[tokio::test]
    async fn search_returns_page_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("q", "Sphynx cat"))
            .and(query_param("searchType", "image"))
            .and(query_param("start", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "link": "https://cats.example/one.jpg" },
                    { "link": "https://cats.example/two.jpg" },
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let items = client.search("Sphynx cat", 11).await;

        let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://cats.example/one.jpg", "https://cats.example/two.jpg"]
        );
    }

    #[tokio::test]
    async fn missing_items_field_is_an_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "searchInformation": { "totalResults": "0" } })),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.search("Toybob cat", 1).await.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_degrade_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.search("Lykoi cat", 1).await.is_empty());
    }

    #[tokio::test]
    async fn success_after_failure_returns_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [ { "link": "https://cats.example/late.png" } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let items = client.search("Minskin cat", 1).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://cats.example/late.png");
    }
}
