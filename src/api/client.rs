//! reqwest-backed [`ExportApi`] implementation.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::models::{BookRecord, CatalogNodeRecord, CommonUsedData, Envelope};
use super::{ApiError, ExportApi, ExportRequest, ExportResponse};
use crate::catalog::{CatalogNode, Repository};
use crate::download::{RetryDecision, RetryPolicy};

/// Origin of the hosted service.
pub const DEFAULT_BASE_URL: &str = "https://www.yuque.com";

/// Default headers the web API expects from its own front end.
#[must_use]
pub fn api_headers(base: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    let referer = format!("{}/", base.as_str().trim_end_matches('/'));
    if let Ok(value) = HeaderValue::from_str(&referer) {
        headers.insert(REFERER, value);
    }
    headers
}

/// Client for the knowledge-base web API.
///
/// The wrapped reqwest client carries the session cookie jar and the
/// [`api_headers`]; see [`crate::download::build_client`]. Read-only GET
/// calls are retried under the client's [`RetryPolicy`]; export submissions
/// are sent once because the job loop above them already re-polls.
#[derive(Debug, Clone)]
pub struct YuqueClient {
    http: Client,
    base: Url,
    retry_policy: RetryPolicy,
}

impl YuqueClient {
    /// Wraps a configured reqwest client talking to `base`, with the default
    /// retry policy.
    #[must_use]
    pub fn new(http: Client, base: Url) -> Self {
        Self {
            http,
            base,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy applied to GET calls.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|_| ApiError::invalid_url(format!("{}{path}", self.base)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let mut attempt: u32 = 1;
        loop {
            let error = match self.get_json_once(&url).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(error.failure_type(), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        attempt,
                        next_attempt = next,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "API request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, "giving up on API request");
                    return Err(error);
                }
            }
        }
    }

    async fn get_json_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(url.as_str(), e))?;
        let response = reject_unauthorized(url.as_str(), response)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(url.as_str(), e))?;
        if !status.is_success() {
            return Err(ApiError::http_status(url.as_str(), status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::decode(url.as_str(), e.to_string()))
    }
}

/// Maps 401/403 and redirects onto a login page to [`ApiError::Unauthorized`].
fn reject_unauthorized(url: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ApiError::unauthorized(url, status.as_u16()));
    }
    if response.url().path().starts_with("/login") {
        debug!(final_url = %response.url(), "request was redirected to the login page");
        return Err(ApiError::unauthorized(url, 0));
    }
    Ok(response)
}

#[async_trait]
impl ExportApi for YuqueClient {
    #[instrument(level = "debug", skip(self))]
    async fn list_repositories(&self) -> Result<Vec<Repository>, ApiError> {
        let url = self.endpoint("/api/mine/common_used")?;
        let envelope: Envelope<CommonUsedData> = self.get_json(url).await?;
        let books = envelope.data.unwrap_or_default().books;

        let mut repositories = Vec::with_capacity(books.len());
        for entry in &books {
            match BookRecord::from_entry(entry) {
                Ok(record) => repositories.push(Repository::from(record)),
                Err(error) => warn!(error = %error, "skipping unreadable knowledge base entry"),
            }
        }
        debug!(count = repositories.len(), "listed knowledge bases");
        Ok(repositories)
    }

    #[instrument(level = "debug", skip(self, repository), fields(book_id = repository.id))]
    async fn list_catalog_nodes(
        &self,
        repository: &Repository,
    ) -> Result<Vec<CatalogNode>, ApiError> {
        let mut url = self.endpoint("/api/catalog_nodes")?;
        url.query_pairs_mut()
            .append_pair("book_id", &repository.id.to_string())
            .append_pair("format", "list");
        let envelope: Envelope<Vec<CatalogNodeRecord>> = self.get_json(url).await?;
        let nodes: Vec<CatalogNode> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|record| record.into_node(repository.id))
            .collect();
        debug!(count = nodes.len(), "listed catalog nodes");
        Ok(nodes)
    }

    #[instrument(level = "debug", skip(self, request), fields(format = %request.format))]
    async fn submit_export(
        &self,
        content_id: u64,
        request: &ExportRequest,
    ) -> Result<ExportResponse, ApiError> {
        let url = self.endpoint(&format!("/api/docs/{content_id}/export"))?;
        let response = self
            .http
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(url.as_str(), e))?;
        let response = reject_unauthorized(url.as_str(), response)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(url.as_str(), e))?;

        // The service refuses some exports with HTTP 400 and a JSON message;
        // those bodies are job answers, not transport failures.
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            return Err(ApiError::http_status(url.as_str(), status.as_u16(), &body));
        }
        let mut parsed: ExportResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ApiError::http_status(url.as_str(), status.as_u16(), &body));
            }
            Err(error) => return Err(ApiError::decode(url.as_str(), error.to_string())),
        };
        if parsed.status.is_none() {
            parsed.status = Some(status.as_u16());
        }
        debug!(state = ?parsed.state(), status = ?parsed.status, "export response");
        Ok(parsed)
    }

    fn base_url(&self) -> &Url {
        &self.base
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::download::{HttpTimeouts, build_client};
    use crate::export::ExportFormat;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> YuqueClient {
        let base = Url::parse(&server.uri()).unwrap();
        let http = build_client(None, "test-agent", HttpTimeouts::default(), api_headers(&base))
            .unwrap();
        YuqueClient::new(http, base).with_retry_policy(RetryPolicy::immediate(3))
    }

    #[test]
    fn test_api_headers_include_referer_and_xhr_marker() {
        let headers = api_headers(&Url::parse("https://www.yuque.com").unwrap());
        assert_eq!(headers[REFERER], "https://www.yuque.com/");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers["x-requested-with"], "XMLHttpRequest");
    }

    #[tokio::test]
    async fn test_list_repositories_reads_wrapped_and_bare_books() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/mine/common_used"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"books": [
                    {"target": {"id": 1, "name": "Handbook", "slug": "hb", "user": {"login": "acme"}, "items_count": 3, "public": 0}},
                    {"id": 2, "name": "Notes", "slug": "notes", "public": true}
                ]}
            })))
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories().await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "Handbook");
        assert_eq!(repos[0].owner_login, "acme");
        assert!(!repos[0].public);
        assert_eq!(repos[1].id, 2);
        assert!(repos[1].public);
    }

    #[tokio::test]
    async fn test_list_repositories_unauthorized() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/mine/common_used"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).list_repositories().await;
        assert!(matches!(result, Err(ApiError::Unauthorized { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_list_catalog_nodes_stamps_book_id() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/catalog_nodes"))
            .and(query_param("book_id", "42"))
            .and(query_param("format", "list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"uuid": "A", "parent_uuid": "", "type": "TITLE", "title": "Guides"},
                    {"uuid": "B", "parent_uuid": "A", "type": "DOC", "title": "Intro", "doc_id": 7, "url": "intro"}
                ]
            })))
            .mount(&server)
            .await;

        let repo = Repository {
            id: 42,
            name: "Handbook".to_string(),
            slug: "hb".to_string(),
            owner_login: "acme".to_string(),
            description: String::new(),
            doc_count: 1,
            public: false,
        };
        let nodes = client_for(&server).list_catalog_nodes(&repo).await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_group());
        assert_eq!(nodes[1].content_id, 7);
        assert!(nodes.iter().all(|n| n.book_id == 42));
    }

    #[tokio::test]
    async fn test_submit_export_posts_format_payload() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/api/docs/7/export"))
            .and(body_partial_json(json!({"type": "pdf", "force": 0, "options": ""})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"state": "success", "url": "/f/x"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .submit_export(7, &ExportRequest::for_format(ExportFormat::Pdf))
            .await
            .unwrap();
        assert_eq!(response.state(), Some("success"));
        assert_eq!(response.download_url(), Some("/f/x"));
        assert_eq!(response.status, Some(200));
    }

    #[tokio::test]
    async fn test_submit_export_400_with_json_body_is_a_response() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/api/docs/9/export"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "请发布后再导出"})),
            )
            .mount(&server)
            .await;

        let response = client_for(&server)
            .submit_export(9, &ExportRequest::for_format(ExportFormat::Markdown))
            .await
            .unwrap();
        assert_eq!(response.status, Some(400));
        assert_eq!(response.message.as_deref(), Some("请发布后再导出"));
    }

    #[tokio::test]
    async fn test_submit_export_500_is_an_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/api/docs/9/export"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .submit_export(9, &ExportRequest::for_format(ExportFormat::Markdown))
            .await;
        assert!(matches!(result, Err(ApiError::HttpStatus { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_list_catalog_nodes_retries_transient_server_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/catalog_nodes"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/catalog_nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"uuid": "B", "parent_uuid": "", "type": "DOC", "title": "Intro", "doc_id": 7}]
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let repo = Repository {
            id: 42,
            name: "Handbook".to_string(),
            slug: "hb".to_string(),
            owner_login: "acme".to_string(),
            description: String::new(),
            doc_count: 1,
            public: false,
        };
        let nodes = client_for(&server).list_catalog_nodes(&repo).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].content_id, 7);
    }

    #[tokio::test]
    async fn test_list_repositories_gives_up_after_max_attempts() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/mine/common_used"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let result = client_for(&server).list_repositories().await;
        assert!(matches!(result, Err(ApiError::HttpStatus { status: 502, .. })));
    }
}
