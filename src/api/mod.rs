//! Remote API surface of the knowledge-base service.
//!
//! - [`ExportApi`] - Async trait the export core talks to
//! - [`YuqueClient`] - reqwest-backed implementation using the session cookies
//! - [`ExportRequest`] / [`ExportResponse`] - submit/poll wire format
//! - [`ApiError`] - transport failures reaching the service

mod client;
mod error;
mod models;

pub use client::{DEFAULT_BASE_URL, YuqueClient, api_headers};
pub use error::ApiError;
pub use models::{ExportData, ExportRequest, ExportResponse};

use async_trait::async_trait;
use url::Url;

use crate::catalog::{CatalogNode, Repository};

/// Operations the export core needs from the remote service.
///
/// This trait uses `async_trait` so the orchestrator can hold a
/// `&dyn ExportApi` and tests can substitute a scripted fake.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Lists the knowledge bases visible to the session.
    async fn list_repositories(&self) -> Result<Vec<Repository>, ApiError>;

    /// Lists the flat, ordered catalog of one knowledge base.
    async fn list_catalog_nodes(
        &self,
        repository: &Repository,
    ) -> Result<Vec<CatalogNode>, ApiError>;

    /// Submits (or, when repeated, polls) an export job for one document.
    ///
    /// A refusal the service answers with HTTP 400 and a JSON body is returned
    /// as an [`ExportResponse`], not as an error.
    async fn submit_export(
        &self,
        content_id: u64,
        request: &ExportRequest,
    ) -> Result<ExportResponse, ApiError>;

    /// Origin relative download URLs are resolved against.
    fn base_url(&self) -> &Url;
}

/// Resolves a possibly relative download URL against `base`.
///
/// # Errors
///
/// Returns [`ApiError::InvalidUrl`] when `raw` cannot be joined onto `base`.
pub fn resolve_download_url(base: &Url, raw: &str) -> Result<Url, ApiError> {
    base.join(raw.trim())
        .map_err(|_| ApiError::invalid_url(raw.to_string()))
}
