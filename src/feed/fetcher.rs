use crate::config::{FetchSettings, SourceConfig, SourceKind};
use crate::feed::entry::RawEntry;
use crate::feed::parser::parse_feed;
use crate::feed::producthunt::ProductHunt;
use crate::feed::retry::RetryPolicy;
use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const USER_AGENT: &str = concat!("techdigest/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching a single source.
///
/// None of these escape [`Fetcher::fetch_source`]; they decide whether a
/// request is retried and end up in the log.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Source URL failed validation
    #[error("Invalid source URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// API response body was not the expected JSON
    #[error("Invalid API response: {0}")]
    Decode(#[from] serde_json::Error),
    /// GraphQL endpoint reported errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),
}

impl FetchError {
    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout
            | FetchError::Network(_)
            | FetchError::IncompleteResponse { .. } => true,
            FetchError::HttpStatus(status) => *status == 429 || *status >= 500,
            FetchError::Parse(_)
            | FetchError::InvalidUrl(_)
            | FetchError::ResponseTooLarge
            | FetchError::Decode(_)
            | FetchError::GraphQl(_) => false,
        }
    }
}

/// Fetches configured sources one at a time.
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    max_entries: usize,
    producthunt: ProductHunt,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, policy: RetryPolicy, producthunt: ProductHunt) -> Self {
        Self {
            client,
            policy,
            max_entries: FetchSettings::default().max_entries_per_source,
            producthunt,
        }
    }

    /// Builds a fetcher from the `fetch` block of the feeds file, reading the
    /// Product Hunt token from the environment.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let producthunt = ProductHunt::from_env(settings.producthunt_page_size);
        Ok(Self::new(client, RetryPolicy::from_settings(settings), producthunt)
            .with_max_entries(settings.max_entries_per_source))
    }

    /// Default cap on entries taken from one feed when the source sets no `limit`.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one source, returning its entries.
    ///
    /// Never fails: every error is logged and yields an empty `Vec`, which the
    /// collect stage counts as a failed source.
    pub async fn fetch_source(&self, source: &SourceConfig) -> Vec<RawEntry> {
        tracing::info!(source = %source.key, name = %source.name, kind = %source.kind, "Fetching source");

        let result = match source.kind {
            SourceKind::Rss | SourceKind::Atom => self.fetch_feed(source).await,
            SourceKind::ProductHunt => {
                self.producthunt
                    .fetch(&self.client, &self.policy, source)
                    .await
            }
        };

        match result {
            Ok(entries) => {
                tracing::info!(source = %source.key, entries = entries.len(), "Fetched source");
                entries
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.key,
                    name = %source.name,
                    error = %e,
                    "Source failed, skipping"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_feed(&self, source: &SourceConfig) -> Result<Vec<RawEntry>, FetchError> {
        let url = validate_url(&source.url)?;
        let bytes = self
            .policy
            .run(&source.key, || self.get_bytes(url.as_str()))
            .await?;

        let limit = source.limit.unwrap_or(self.max_entries);
        let items = parse_feed(&bytes, limit).map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(items
            .into_iter()
            .map(|item| RawEntry::from_item(item, source))
            .collect())
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_FEED_SIZE).await
        };

        tokio::time::timeout(self.policy.request_timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Entry</title><link>https://example.com/entry</link><description>Summary</description></item>
    <item><title>Other</title><link>https://example.com/other</link></item>
</channel></rss>"#;

    fn test_fetcher() -> Fetcher {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
            request_timeout: Duration::from_millis(500),
        };
        Fetcher::new(
            reqwest::Client::new(),
            policy,
            ProductHunt::new("http://127.0.0.1:9/graphql", None, 20),
        )
    }

    fn test_source(url: String) -> SourceConfig {
        SourceConfig {
            key: "sample".into(),
            name: "Sample Feed".into(),
            url,
            kind: SourceKind::Rss,
            tags: vec!["tag".into()],
            category: Some("community".into()),
            enabled: true,
            limit: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_rss_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        let entries = test_fetcher().fetch_source(&source).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("Entry"));
        assert_eq!(entries[0].link, "https://example.com/entry");
        assert_eq!(entries[0].source_name, "Sample Feed");
        assert_eq!(entries[0].source_key, "sample");
        assert_eq!(entries[0].category.as_deref(), Some("community"));
        assert_eq!(entries[0].tags, vec!["tag"]);
    }

    #[tokio::test]
    async fn test_source_limit_caps_entries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let mut source = test_source(format!("{}/feed", mock_server.uri()));
        source.limit = Some(1);
        let entries = test_fetcher().fetch_source(&source).await;
        assert_eq!(entries.len(), 1);

        source.limit = None;
        let entries = test_fetcher().with_max_entries(1).fetch_source(&source).await;
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_retries_exact_budget_then_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(3)
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        let entries = test_fetcher().fetch_source(&source).await;

        assert!(entries.is_empty());
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_server_error_retries_then_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        assert!(test_fetcher().fetch_source(&source).await.is_empty());
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        use wiremock::matchers::any;

        let mock_server = MockServer::start().await;

        // First two requests return 503, third succeeds
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        let entries = test_fetcher().fetch_source(&source).await;
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_404_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        assert!(test_fetcher().fetch_source(&source).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = test_source(format!("{}/feed", mock_server.uri()));
        assert!(test_fetcher().fetch_source(&source).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_yields_empty() {
        let source = test_source("file:///etc/passwd".into());
        assert!(test_fetcher().fetch_source(&source).await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_producthunt_without_token_skips_network() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            RetryPolicy::default(),
            ProductHunt::new(format!("{}/graphql", mock_server.uri()), None, 20),
        );
        let mut source = test_source("https://www.producthunt.com".into());
        source.kind = SourceKind::ProductHunt;

        assert!(fetcher.fetch_source(&source).await.is_empty());
    }

    #[test]
    fn test_retry_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::HttpStatus(429).is_retryable());
        assert!(FetchError::HttpStatus(502).is_retryable());
        assert!(!FetchError::HttpStatus(404).is_retryable());
        assert!(!FetchError::Parse("x".into()).is_retryable());
        assert!(!FetchError::ResponseTooLarge.is_retryable());
        assert!(!FetchError::GraphQl("x".into()).is_retryable());
    }
}
