//! Merged pull request retrieval from the GitHub search API.
//!
//! One query per run: every pull request authored by the user and merged on
//! or after a cutoff date, newest activity first. Results are then grouped by
//! target repository with [`group_by_repository`].

mod grouping;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use contribmerge_shared::{ContribMergeError, GithubConfig, Result};

pub use grouping::{PullRequest, RepoContributions, group_by_repository};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("contribmerge/", env!("CARGO_PKG_VERSION"));

/// Page size ceiling of the search API.
const MAX_PER_PAGE: usize = 100;

/// The search API never returns more than this many results for one query.
const SEARCH_RESULT_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubOptions {
    /// REST API base, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Bearer token.
    pub token: String,
    /// Upper bound on pull requests returned by one fetch.
    pub max_results: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl GithubOptions {
    pub fn from_config(config: &GithubConfig, token: impl Into<String>) -> Self {
        Self {
            api_base: config.api_base.clone(),
            token: token.into(),
            max_results: config.max_results,
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    html_url: String,
    title: String,
    body: Option<String>,
    repository_url: String,
    #[serde(default)]
    labels: Vec<LabelItem>,
    closed_at: Option<DateTime<Utc>>,
    pull_request: Option<PullRequestLinks>,
}

#[derive(Debug, Deserialize)]
struct LabelItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestLinks {
    merged_at: Option<DateTime<Utc>>,
}

impl From<SearchItem> for PullRequest {
    fn from(item: SearchItem) -> Self {
        let merged_at = item
            .pull_request
            .and_then(|links| links.merged_at)
            .or(item.closed_at);
        Self {
            html_url: item.html_url,
            title: item.title,
            body: item.body,
            repository_url: item.repository_url,
            labels: item.labels.into_iter().map(|l| l.name).collect(),
            merged_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated client for the search endpoint.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    search_url: Url,
    max_results: usize,
}

impl GithubClient {
    /// Build a client. Fails with a validation error on a malformed base URL
    /// or a token that is not a valid header value.
    pub fn new(opts: GithubOptions) -> Result<Self> {
        let base = opts.api_base.trim_end_matches('/');
        let search_url = Url::parse(&format!("{base}/search/issues")).map_err(|e| {
            ContribMergeError::validation(format!("invalid API base '{}': {e}", opts.api_base))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", opts.token))
            .map_err(|_| ContribMergeError::validation("token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| ContribMergeError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            search_url,
            max_results: opts.max_results.min(SEARCH_RESULT_LIMIT),
        })
    }

    /// Search query for pull requests by `username` merged on or after `since`.
    pub fn search_query(username: &str, since: NaiveDate) -> String {
        format!("author:{username} type:pr is:merged merged:>={since}")
    }

    /// Fetch up to `max_results` merged pull requests, most recently updated first.
    #[instrument(skip(self), fields(max_results = self.max_results))]
    pub async fn fetch_merged_prs(
        &self,
        username: &str,
        since: NaiveDate,
    ) -> Result<Vec<PullRequest>> {
        let query = Self::search_query(username, since);
        let per_page = self.max_results.clamp(1, MAX_PER_PAGE);
        let mut prs: Vec<PullRequest> = Vec::new();
        let mut page = 1usize;

        info!(%query, "searching merged pull requests");

        while prs.len() < self.max_results {
            let response = self.fetch_page(&query, per_page, page).await?;
            let received = response.items.len();

            if response.incomplete_results {
                warn!(page, "search results are incomplete");
            }
            debug!(page, received, total = response.total_count, "search page");

            prs.extend(response.items.into_iter().map(PullRequest::from));

            let seen = (page * per_page) as u64;
            if received < per_page || seen >= response.total_count {
                break;
            }
            page += 1;
        }

        prs.truncate(self.max_results);
        info!(count = prs.len(), "fetched merged pull requests");
        Ok(prs)
    }

    async fn fetch_page(&self, query: &str, per_page: usize, page: usize) -> Result<SearchResponse> {
        let url = self.search_url.as_str();
        let per_page = per_page.to_string();
        let page = page.to_string();
        let response = self
            .http
            .get(self.search_url.clone())
            .query(&[
                ("q", query),
                ("sort", "updated"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ContribMergeError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or(body);
            return Err(ContribMergeError::Fetch(format!(
                "{url}: HTTP {status}: {}",
                detail.trim()
            )));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| ContribMergeError::Fetch(format!("{url}: invalid search response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn since() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn client(server: &MockServer, max_results: usize) -> GithubClient {
        GithubClient::new(GithubOptions {
            api_base: server.uri(),
            token: "test-token".into(),
            max_results,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/github/search-issues.fixture.json")
            .expect("read search fixture")
    }

    #[test]
    fn query_format() {
        assert_eq!(
            GithubClient::search_query("octo-dev", since()),
            "author:octo-dev type:pr is:merged merged:>=2024-05-01"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        let err = GithubClient::new(GithubOptions {
            api_base: "not a url".into(),
            token: "t".into(),
            max_results: 10,
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, ContribMergeError::Validation { .. }));
    }

    #[tokio::test]
    async fn fetches_and_maps_fixture() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param(
                "q",
                "author:octo-dev type:pr is:merged merged:>=2024-05-01",
            ))
            .and(query_param("sort", "updated"))
            .and(query_param("order", "desc"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let prs = client(&server, 100)
            .fetch_merged_prs("octo-dev", since())
            .await
            .unwrap();

        assert_eq!(prs.len(), 4);
        assert_eq!(prs[0].repository(), Some("galaxyproject/planemo"));
        assert_eq!(prs[0].labels, vec!["enhancement".to_string()]);
        assert!(prs[0].merged_at.is_some());
        // no pull_request.merged_at: falls back to closed_at
        assert!(prs[3].merged_at.is_some());
        assert!(prs[2].body.is_none());

        let groups = group_by_repository(prs, "octo-dev");
        let names: Vec<&str> = groups.iter().map(|g| g.repository.as_str()).collect();
        assert_eq!(
            names,
            vec!["galaxyproject/planemo", "research-software-ecosystem/content"]
        );
    }

    #[tokio::test]
    async fn respects_max_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param("per_page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let prs = client(&server, 2)
            .fetch_merged_prs("octo-dev", since())
            .await
            .unwrap();
        assert_eq!(prs.len(), 2);
    }

    #[tokio::test]
    async fn http_error_is_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"message":"API rate limit exceeded"}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server, 100)
            .fetch_merged_prs("octo-dev", since())
            .await
            .unwrap_err();
        match err {
            ContribMergeError::Fetch(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("rate limit"));
            }
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server, 100)
            .fetch_merged_prs("octo-dev", since())
            .await
            .unwrap_err();
        assert!(matches!(err, ContribMergeError::Fetch(_)));
    }
}
