//! Scripted [`ExportApi`] for exercising the export core without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::api::{ApiError, ExportApi, ExportRequest, ExportResponse};
use crate::catalog::{CatalogNode, Repository};

type Script = VecDeque<Result<ExportResponse, ApiError>>;

/// Replays canned responses in order.
///
/// Export responses are taken from the per-document script when one exists,
/// otherwise from the shared script. An exhausted script answers with an
/// HTTP 500 error so a test never hangs on a missing response.
pub struct ScriptedApi {
    base: Url,
    repositories: Vec<Repository>,
    catalogs: HashMap<u64, Vec<CatalogNode>>,
    failing_catalogs: HashSet<u64>,
    shared: Mutex<Script>,
    per_document: Mutex<HashMap<u64, Script>>,
    export_calls: AtomicUsize,
    submitted: Mutex<Vec<u64>>,
}

impl ScriptedApi {
    /// An API with no repositories and no scripted exports.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Url::parse("https://www.yuque.com").expect("static base URL"),
            repositories: Vec::new(),
            catalogs: HashMap::new(),
            failing_catalogs: HashSet::new(),
            shared: Mutex::new(VecDeque::new()),
            per_document: Mutex::new(HashMap::new()),
            export_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// An API answering every export call from `responses`, in order.
    #[must_use]
    pub fn with_exports(responses: Vec<Result<ExportResponse, ApiError>>) -> Self {
        let api = Self::new();
        *lock(&api.shared) = responses.into();
        api
    }

    /// Overrides the origin relative download URLs resolve against.
    #[must_use]
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    /// Adds a repository whose catalog is `nodes`.
    #[must_use]
    pub fn with_catalog(mut self, repository: Repository, nodes: Vec<CatalogNode>) -> Self {
        self.catalogs.insert(repository.id, nodes);
        self.repositories.push(repository);
        self
    }

    /// Adds a repository whose catalog listing fails.
    #[must_use]
    pub fn with_failing_catalog(mut self, repository: Repository) -> Self {
        self.failing_catalogs.insert(repository.id);
        self.repositories.push(repository);
        self
    }

    /// Scripts the export responses for one content id.
    #[must_use]
    pub fn with_document_script(
        self,
        content_id: u64,
        responses: Vec<Result<ExportResponse, ApiError>>,
    ) -> Self {
        lock(&self.per_document).insert(content_id, responses.into());
        self
    }

    /// Number of submit/poll calls made so far.
    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    /// Content ids in the order their export calls arrived.
    pub fn submitted(&self) -> Vec<u64> {
        lock(&self.submitted).clone()
    }
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn exhausted() -> Result<ExportResponse, ApiError> {
    Err(ApiError::http_status("scripted", 500, "script exhausted"))
}

#[async_trait]
impl ExportApi for ScriptedApi {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ApiError> {
        Ok(self.repositories.clone())
    }

    async fn list_catalog_nodes(
        &self,
        repository: &Repository,
    ) -> Result<Vec<CatalogNode>, ApiError> {
        if self.failing_catalogs.contains(&repository.id) {
            return Err(ApiError::http_status("scripted", 502, "catalog unavailable"));
        }
        Ok(self.catalogs.get(&repository.id).cloned().unwrap_or_default())
    }

    async fn submit_export(
        &self,
        content_id: u64,
        _request: &ExportRequest,
    ) -> Result<ExportResponse, ApiError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.submitted).push(content_id);
        if let Some(script) = lock(&self.per_document).get_mut(&content_id) {
            return script.pop_front().unwrap_or_else(exhausted);
        }
        lock(&self.shared).pop_front().unwrap_or_else(exhausted)
    }

    fn base_url(&self) -> &Url {
        &self.base
    }
}
