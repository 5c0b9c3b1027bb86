//! Product Hunt posts via the v2 GraphQL API.
use crate::config::SourceConfig;
use crate::feed::entry::RawEntry;
use crate::feed::fetcher::{read_limited_bytes, FetchError};
use crate::feed::retry::RetryPolicy;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;

pub const PRODUCTHUNT_API_URL: &str = "https://api.producthunt.com/v2/api/graphql";
pub const PRODUCTHUNT_TOKEN_ENV: &str = "PRODUCTHUNT_TOKEN";

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

const POSTS_QUERY: &str = "query Posts($first: Int!) { \
posts(first: $first, order: RANKING) { edges { node { \
name tagline description url website createdAt \
topics { edges { node { name } } } } } } }";

/// Product Hunt client settings. The token is optional: without it every
/// Product Hunt source yields nothing and no request is made.
#[derive(Debug)]
pub struct ProductHunt {
    endpoint: String,
    token: Option<SecretString>,
    page_size: usize,
}

impl ProductHunt {
    pub fn new(endpoint: impl Into<String>, token: Option<SecretString>, page_size: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            page_size,
        }
    }

    /// Uses the public endpoint and reads the token from `PRODUCTHUNT_TOKEN`.
    pub fn from_env(page_size: usize) -> Self {
        let token = std::env::var(PRODUCTHUNT_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        Self::new(PRODUCTHUNT_API_URL, token, page_size)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) async fn fetch(
        &self,
        client: &reqwest::Client,
        policy: &RetryPolicy,
        source: &SourceConfig,
    ) -> Result<Vec<RawEntry>, FetchError> {
        let Some(token) = &self.token else {
            tracing::warn!(
                source = %source.key,
                env = PRODUCTHUNT_TOKEN_ENV,
                "Product Hunt token not set, skipping source"
            );
            return Ok(Vec::new());
        };

        let first = source.limit.unwrap_or(self.page_size);
        let body = serde_json::to_vec(&serde_json::json!({
            "query": POSTS_QUERY,
            "variables": { "first": first },
        }))?;

        let bytes = policy
            .run(&source.key, || self.post(client, policy, token, &body))
            .await?;

        let response: GraphQlResponse = serde_json::from_slice(&bytes)?;
        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }
        let data = response
            .data
            .ok_or_else(|| FetchError::GraphQl("response has no data".into()))?;

        Ok(data
            .posts
            .edges
            .into_iter()
            .map(|edge| edge.node.into_entry(source))
            .collect())
    }

    async fn post(
        &self,
        client: &reqwest::Client,
        policy: &RetryPolicy,
        token: &SecretString,
        body: &[u8],
    ) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = client
                .post(&self.endpoint)
                .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .body(body.to_vec())
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_RESPONSE_SIZE).await
        };

        tokio::time::timeout(policy.request_timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<PostsData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct PostsData {
    posts: Connection<PostNode>,
}

#[derive(Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    name: Option<String>,
    tagline: Option<String>,
    description: Option<String>,
    website: Option<String>,
    url: Option<String>,
    created_at: Option<String>,
    topics: Option<Connection<TopicNode>>,
}

#[derive(Deserialize)]
struct TopicNode {
    name: String,
}

impl PostNode {
    fn into_entry(self, source: &SourceConfig) -> RawEntry {
        let topics = self
            .topics
            .map(|t| t.edges.into_iter().map(|e| e.node.name).collect())
            .unwrap_or_default();

        RawEntry {
            title: non_empty(self.name),
            link: non_empty(self.website)
                .or_else(|| non_empty(self.url))
                .unwrap_or_default(),
            summary: non_empty(self.tagline)
                .or_else(|| non_empty(self.description))
                .unwrap_or_default(),
            published: self.created_at.unwrap_or_default(),
            source_name: source.name.clone(),
            source_key: source.key.clone(),
            tags: union_tags(&source.tags, topics),
            category: source.category.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Source tags followed by topic tags, first occurrence wins.
fn union_tags(source_tags: &[String], topics: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    source_tags
        .iter()
        .cloned()
        .chain(topics)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
