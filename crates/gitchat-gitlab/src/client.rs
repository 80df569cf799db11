//! Async GitLab REST v4 client.
//!
//! Every request passes through a shared rate limiter (one request per
//! `min_request_interval_ms`) and a bounded exponential backoff retry loop,
//! mirroring the original Python client's `_rate_limit`/`@retry` decorators.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{GitlabError, Result};
use crate::types::*;

/// Maximum pages `paginate` will walk before giving up, matching the
/// original client's safety cap.
const MAX_PAGES: u32 = 100;

/// Page size used for all paginated listing endpoints.
const PER_PAGE: u32 = 100;

type GitlabRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for constructing a [`GitlabClient`].
#[derive(Debug, Clone)]
pub struct GitlabClientConfig {
    pub base_url: String,
    pub private_token: String,
    pub timeout_secs: u64,
    pub min_request_interval_ms: u64,
    pub max_retries: u32,
}

impl GitlabClientConfig {
    pub fn new(base_url: impl Into<String>, private_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            private_token: private_token.into(),
            timeout_secs: 30,
            min_request_interval_ms: 100,
            max_retries: 3,
        }
    }
}

/// Async client for GitLab API v4.
#[derive(Clone)]
pub struct GitlabClient {
    http: Client,
    api_url: String,
    private_token: String,
    max_retries: u32,
    rate_limiter: Arc<GitlabRateLimiter>,
}

impl GitlabClient {
    /// Build a new client from configuration.
    pub fn new(config: GitlabClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let interval_ms = config.min_request_interval_ms.max(1);
        let requests_per_second =
            NonZeroU32::new((1000 / interval_ms).max(1) as u32).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second)));

        let base = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            api_url: format!("{base}/api/v4"),
            private_token: config.private_token,
            max_retries: config.max_retries,
            rate_limiter,
        })
    }

    /// Make a single GitLab API request with retry and rate limiting.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_url, endpoint);

        let mut retry_delay = Duration::from_secs(1);
        let mut last_error: Option<GitlabError> = None;

        for attempt in 0..=self.max_retries {
            self.rate_limiter.until_ready().await;

            match self.send_once::<T>(method.clone(), &url, query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt == self.max_retries {
                        return Err(e);
                    }
                    warn!(endpoint, attempt, error = %e, "retrying GitLab request");
                    last_error = Some(e);
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(Duration::from_secs(10));
                }
            }
        }

        Err(GitlabError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts: self.max_retries + 1,
            source: Box::new(last_error.unwrap_or(GitlabError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                endpoint: endpoint.to_string(),
                body: "unknown error".to_string(),
            })),
        })
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .request(method, url)
            .header("PRIVATE-TOKEN", &self.private_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitlabError::Status {
                status,
                endpoint: url.to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| GitlabError::Decode {
            endpoint: url.to_string(),
            source,
        })
    }

    /// Walk every page of a listing endpoint until a short page or the
    /// page cap is hit.
    async fn paginate<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<Vec<T>> {
        query.retain(|(k, _)| *k != "per_page" && *k != "page");
        let mut page = 1u32;
        let mut all = Vec::new();

        for _ in 0..MAX_PAGES {
            let mut page_query = query.clone();
            page_query.push(("per_page", PER_PAGE.to_string()));
            page_query.push(("page", page.to_string()));

            let results: Vec<T> = self.request(Method::GET, endpoint, &page_query).await?;
            let len = results.len();
            all.extend(results);

            if len < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        debug!(endpoint, count = all.len(), "paginated GitLab listing");
        Ok(all)
    }

    // ---- Projects -------------------------------------------------------

    pub async fn get_projects(&self, membership: bool) -> Result<Vec<Project>> {
        self.paginate(
            "/projects",
            vec![("membership", membership.to_string())],
        )
        .await
    }

    pub async fn get_project(&self, project_id: i64) -> Result<Project> {
        self.request(Method::GET, &format!("/projects/{project_id}"), &[])
            .await
    }

    // ---- Issues ----------------------------------------------------------

    pub async fn get_all_issues(&self, project_id: i64) -> Result<Vec<Issue>> {
        self.paginate(
            &format!("/projects/{project_id}/issues"),
            vec![
                ("state", "all".to_string()),
                ("order_by", "updated_at".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// Issues updated at or after `updated_after` (an ISO 8601 timestamp),
    /// used by incremental sync to fetch only the delta since the last run.
    pub async fn get_issues_updated_after(
        &self,
        project_id: i64,
        updated_after: &str,
    ) -> Result<Vec<Issue>> {
        self.paginate(
            &format!("/projects/{project_id}/issues"),
            vec![
                ("state", "all".to_string()),
                ("updated_after", updated_after.to_string()),
                ("order_by", "updated_at".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// IDs of every issue in a project, used for tombstone detection during sync.
    pub async fn get_issue_ids(&self, project_id: i64) -> Result<Vec<i64>> {
        let issues = self.get_all_issues(project_id).await?;
        Ok(issues.into_iter().map(|i| i.id).collect())
    }

    pub async fn get_issue(&self, project_id: i64, issue_iid: i64) -> Result<Issue> {
        self.request(
            Method::GET,
            &format!("/projects/{project_id}/issues/{issue_iid}"),
            &[],
        )
        .await
    }

    pub async fn get_issue_notes(&self, project_id: i64, issue_iid: i64) -> Result<Vec<Note>> {
        self.paginate(
            &format!("/projects/{project_id}/issues/{issue_iid}/notes"),
            vec![
                ("sort", "asc".to_string()),
                ("order_by", "created_at".to_string()),
            ],
        )
        .await
    }

    pub async fn get_issue_discussions(
        &self,
        project_id: i64,
        issue_iid: i64,
    ) -> Result<Vec<Discussion>> {
        self.paginate(
            &format!("/projects/{project_id}/issues/{issue_iid}/discussions"),
            vec![],
        )
        .await
    }

    // ---- Merge requests ---------------------------------------------------

    pub async fn get_all_merge_requests(&self, project_id: i64) -> Result<Vec<MergeRequest>> {
        self.paginate(
            &format!("/projects/{project_id}/merge_requests"),
            vec![
                ("state", "all".to_string()),
                ("order_by", "updated_at".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// Merge requests updated at or after `updated_after`, the MR analogue
    /// of [`GitlabClient::get_issues_updated_after`].
    pub async fn get_merge_requests_updated_after(
        &self,
        project_id: i64,
        updated_after: &str,
    ) -> Result<Vec<MergeRequest>> {
        self.paginate(
            &format!("/projects/{project_id}/merge_requests"),
            vec![
                ("state", "all".to_string()),
                ("updated_after", updated_after.to_string()),
                ("order_by", "updated_at".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    pub async fn get_mr_ids(&self, project_id: i64) -> Result<Vec<i64>> {
        let mrs = self.get_all_merge_requests(project_id).await?;
        Ok(mrs.into_iter().map(|m| m.id).collect())
    }

    pub async fn get_merge_request(&self, project_id: i64, mr_iid: i64) -> Result<MergeRequest> {
        self.request(
            Method::GET,
            &format!("/projects/{project_id}/merge_requests/{mr_iid}"),
            &[],
        )
        .await
    }

    pub async fn get_mr_notes(&self, project_id: i64, mr_iid: i64) -> Result<Vec<Note>> {
        self.paginate(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/notes"),
            vec![
                ("sort", "asc".to_string()),
                ("order_by", "created_at".to_string()),
            ],
        )
        .await
    }

    pub async fn get_mr_discussions(&self, project_id: i64, mr_iid: i64) -> Result<Vec<Discussion>> {
        self.paginate(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/discussions"),
            vec![],
        )
        .await
    }

    pub async fn get_mr_diffs(&self, project_id: i64, mr_iid: i64) -> Result<Vec<MrDiff>> {
        self.request(
            Method::GET,
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/diffs"),
            &[],
        )
        .await
    }

    // ---- Repository --------------------------------------------------------

    pub async fn get_repository_tree(
        &self,
        project_id: i64,
        path: &str,
        git_ref: &str,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>> {
        let mut query = vec![
            ("ref", git_ref.to_string()),
            ("recursive", recursive.to_string()),
        ];
        if !path.is_empty() {
            query.push(("path", path.to_string()));
        }
        self.paginate(&format!("/projects/{project_id}/repository/tree"), query)
            .await
    }

    pub async fn get_file_content(
        &self,
        project_id: i64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<FileContent> {
        let encoded_path = urlencoding::encode(file_path);
        self.request(
            Method::GET,
            &format!("/projects/{project_id}/repository/files/{encoded_path}"),
            &[("ref", git_ref.to_string())],
        )
        .await
    }

    /// Fetch the raw (decoded, non-base64) file body, used by the chunker.
    pub async fn get_file_raw(
        &self,
        project_id: i64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<String> {
        self.rate_limiter.until_ready().await;
        let encoded_path = urlencoding::encode(file_path);
        let url = format!(
            "{}/projects/{project_id}/repository/files/{encoded_path}/raw",
            self.api_url
        );

        let response = self
            .http
            .get(&url)
            .header("PRIVATE-TOKEN", &self.private_token)
            .query(&[("ref", git_ref)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitlabError::Status {
                status,
                endpoint: url,
                body,
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_client(server: &MockServer) -> GitlabClient {
        let mut config = GitlabClientConfig::new(server.uri(), "test-token");
        config.min_request_interval_ms = 1;
        GitlabClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn get_project_sends_private_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .and(header("PRIVATE-TOKEN", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42,
                "name": "demo",
                "path_with_namespace": "group/demo",
                "web_url": "https://gitlab.example.com/group/demo",
                "default_branch": "main",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let project = client.get_project(42).await.unwrap();
        assert_eq!(project.id, 42);
        assert_eq!(project.path_with_namespace, "group/demo");
    }

    #[tokio::test]
    async fn paginate_walks_until_short_page() {
        let server = MockServer::start().await;

        let full_page: Vec<Value> = (0..100)
            .map(|i| {
                serde_json::json!({
                    "id": i, "iid": i, "title": "t", "state": "opened",
                    "author": {"username": "u"}, "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z",
                    "web_url": "https://example.com"
                })
            })
            .collect();
        let short_page: Vec<Value> = full_page[..5].to_vec();

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/1/issues"))
            .and(wiremock::matchers::query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&full_page))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/1/issues"))
            .and(wiremock::matchers::query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&short_page))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let issues = client.get_all_issues(1).await.unwrap();
        assert_eq!(issues.len(), 105);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/7"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7,
                "name": "demo",
                "path_with_namespace": "group/demo",
                "web_url": "https://gitlab.example.com/group/demo",
                "default_branch": "main",
            })))
            .mount(&server)
            .await;

        let mut config = GitlabClientConfig::new(server.uri(), "test-token");
        config.min_request_interval_ms = 1;
        let client = GitlabClient::new(config).unwrap();

        let project = client.get_project(7).await.unwrap();
        assert_eq!(project.id, 7);
    }

    #[tokio::test]
    async fn not_found_does_not_retry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/999"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client.get_project(999).await.unwrap_err();
        assert!(matches!(err, GitlabError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }
}
