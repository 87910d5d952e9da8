//! GitHub GraphQL client.
//!
//! Executes the two typed queries the sync engine needs (topic search and
//! repository detail) and surfaces the rate-limit headers of each response.
//! The credential is supplied per call so one client serves every tenant.

use crate::error::AppError;
use crate::models::Credential;
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Public GitHub GraphQL endpoint.
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const SEARCH_REPOSITORIES_QUERY: &str = r#"
query SearchRepositories($query: String!) {
  search(query: $query, type: REPOSITORY, first: 100) {
    repos: edges {
      repo: node {
        ... on Repository {
          name
          url
          owner { login }
        }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const REPOSITORY_DETAIL_QUERY: &str = r#"
query RepositoryDetail($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    name
    url
    owner { login }
    pullRequests(last: 100, orderBy: {field: CREATED_AT, direction: ASC}) {
      nodes {
        id
        state
        title
        createdAt
        mergedAt
        permalink
        author { login }
      }
    }
    vulnerabilityAlerts(last: 100) {
      nodes {
        id
        number
        state
        createdAt
        fixedAt
        securityVulnerability {
          package { name }
          advisory { severity }
          firstPatchedVersion { identifier }
          updatedAt
        }
      }
    }
  }
}
"#;

/// GitHub client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// GraphQL endpoint URL.
    pub endpoint: String,

    /// Per-request timeout. `None` leaves deadlines to the caller's cancellation.
    pub timeout_secs: Option<u64>,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

/// Rate-limit triplet reported by the remote on every response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub used: Option<u32>,
}

/// A decoded response together with the rate limits it reported.
#[derive(Debug, Clone)]
pub struct RemoteResponse<T> {
    pub data: T,
    pub rate_limits: RateLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// A repository returned by the topic search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoNode {
    pub name: String,
    pub url: String,
    pub owner: Owner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoEdge {
    /// Null when the search hit is not a repository.
    pub repo: Option<RepoNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// First page of a topic search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub repos: Vec<RepoEdge>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl SearchResult {
    /// Discovered repositories in result order.
    pub fn repositories(&self) -> impl Iterator<Item = &RepoNode> {
        self.repos.iter().filter_map(|edge| edge.repo.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub id: String,
    pub state: String,
    pub title: String,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub permalink: String,
    /// Null for deleted accounts.
    pub author: Option<Owner>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Advisory {
    pub severity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchedVersion {
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityVulnerability {
    pub package: PackageRef,
    pub advisory: Advisory,
    pub first_patched_version: Option<PatchedVersion>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNode {
    pub id: String,
    pub number: Option<i64>,
    pub state: String,
    pub created_at: Option<String>,
    pub fixed_at: Option<String>,
    pub security_vulnerability: SecurityVulnerability,
}

/// One repository with its recent pull requests and vulnerability alerts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDetail {
    pub name: String,
    pub url: String,
    pub owner: Owner,
    #[serde(default)]
    pub pull_requests: Connection<PullRequestNode>,
    #[serde(default)]
    pub vulnerability_alerts: Connection<AlertNode>,
}

/// The two remote operations the sync engine depends on.
///
/// Each call is exactly one round-trip. Implementations must never log or
/// echo the credential.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// First page (at most 100) of repositories in `namespace` tagged `topic`.
    async fn search_repositories(
        &self,
        namespace: &str,
        topic: &str,
        credential: &Credential,
    ) -> Result<RemoteResponse<SearchResult>, AppError>;

    /// Recent pull requests and vulnerability alerts of one repository.
    async fn get_repository_detail(
        &self,
        namespace: &str,
        repo_name: &str,
        credential: &Credential,
    ) -> Result<RemoteResponse<RepositoryDetail>, AppError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchResult,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryDetail>,
}

/// GitHub GraphQL client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AppError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// POST one GraphQL query and decode its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        credential: &Credential,
    ) -> Result<RemoteResponse<T>, AppError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(credential.expose())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let rate_limits = parse_rate_limits(response.headers());
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &rate_limits, &body, &self.config.endpoint));
        }

        let data = decode_envelope::<T>(&body)?;
        Ok(RemoteResponse { data, rate_limits })
    }
}

#[async_trait]
impl RemoteClient for GitHubClient {
    async fn search_repositories(
        &self,
        namespace: &str,
        topic: &str,
        credential: &Credential,
    ) -> Result<RemoteResponse<SearchResult>, AppError> {
        let variables = json!({ "query": search_query(namespace, topic) });
        let response = self
            .execute::<SearchData>(SEARCH_REPOSITORIES_QUERY, variables, credential)
            .await?;

        Ok(RemoteResponse {
            data: response.data.search,
            rate_limits: response.rate_limits,
        })
    }

    async fn get_repository_detail(
        &self,
        namespace: &str,
        repo_name: &str,
        credential: &Credential,
    ) -> Result<RemoteResponse<RepositoryDetail>, AppError> {
        let variables = json!({ "owner": namespace, "name": repo_name });
        let response = self
            .execute::<RepositoryData>(REPOSITORY_DETAIL_QUERY, variables, credential)
            .await?;

        let detail = response.data.repository.ok_or_else(|| {
            AppError::not_found_with_id("Repository", format!("{}/{}", namespace, repo_name))
        })?;

        Ok(RemoteResponse {
            data: detail,
            rate_limits: response.rate_limits,
        })
    }
}

/// Search string for repositories of `namespace` carrying `topic`.
fn search_query(namespace: &str, topic: &str) -> String {
    format!("org:{} topic:{}", namespace, topic)
}

/// Extract the `x-ratelimit-*` triplet. Missing or malformed headers are `None`.
pub fn parse_rate_limits(headers: &HeaderMap) -> RateLimits {
    let get_header = |name: &str| -> Option<u32> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    };

    RateLimits {
        limit: get_header("x-ratelimit-limit"),
        remaining: get_header("x-ratelimit-remaining"),
        used: get_header("x-ratelimit-used"),
    }
}

/// Decode a GraphQL body; a non-empty `errors` list becomes one joined error.
fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    let envelope: GraphQlEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| AppError::network(format!("Failed to decode response: {}", e)))?;

    if !envelope.errors.is_empty() {
        return Err(AppError::remote_payload(
            envelope.errors.into_iter().map(|e| e.message),
        ));
    }

    envelope
        .data
        .ok_or_else(|| AppError::remote_api("Response contained no data"))
}

fn status_error(status: StatusCode, rate_limits: &RateLimits, body: &str, endpoint: &str) -> AppError {
    if status == StatusCode::UNAUTHORIZED {
        return AppError::authentication("Credential rejected by remote");
    }

    let message = match status {
        StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded".to_string(),
        StatusCode::FORBIDDEN if rate_limits.remaining == Some(0) => {
            "Rate limit exceeded".to_string()
        }
        StatusCode::FORBIDDEN => "Access denied".to_string(),
        _ => serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("Request failed ({})", status.as_u16())),
    };

    AppError::remote_api_full(message, status.as_u16(), endpoint)
}
