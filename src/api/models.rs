//! Wire formats of the knowledge-base service API.
//!
//! The service is loose about field presence (nulls, missing keys, ints
//! standing in for booleans), so every record is decoded leniently and then
//! converted into the crate's own [`Repository`] / [`CatalogNode`] types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{CatalogNode, NodeKind, Repository};
use crate::export::ExportFormat;

/// Generic `{ "data": ... }` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: Option<T>,
}

/// `data` of the common-used listing.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CommonUsedData {
    #[serde(default)]
    pub(crate) books: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct UserRecord {
    #[serde(default)]
    login: Option<String>,
}

/// A knowledge base as listed by the service.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BookRecord {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    items_count: Option<u64>,
    #[serde(default)]
    public: Value,
}

impl BookRecord {
    /// Decodes one `books[]` entry, which may wrap the record in `target`.
    pub(crate) fn from_entry(entry: &Value) -> Result<Self, serde_json::Error> {
        let record = entry.get("target").unwrap_or(entry);
        Self::deserialize(record)
    }
}

impl From<BookRecord> for Repository {
    fn from(record: BookRecord) -> Self {
        let public = match &record.public {
            Value::Bool(flag) => *flag,
            Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            _ => false,
        };
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            slug: record.slug.unwrap_or_default(),
            owner_login: record.user.and_then(|u| u.login).unwrap_or_default(),
            description: record.description.unwrap_or_default(),
            doc_count: record.items_count.unwrap_or(0),
            public,
        }
    }
}

/// One catalog entry as listed by the service.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CatalogNodeRecord {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    doc_id: Option<u64>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    level: Option<u32>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl CatalogNodeRecord {
    /// Converts the record into a catalog node owned by `book_id`.
    ///
    /// The export endpoint is keyed by `doc_id`; catalog entries that lack it
    /// fall back to `id`.
    pub(crate) fn into_node(self, book_id: u64) -> CatalogNode {
        let kind = NodeKind::from_api_type(self.kind.as_deref().unwrap_or("DOC"));
        let content_id = self.doc_id.filter(|id| *id != 0).or(self.id).unwrap_or(0);
        let slug = self
            .url
            .filter(|u| !u.is_empty())
            .or(self.slug)
            .unwrap_or_default();
        CatalogNode {
            uuid: self.uuid.unwrap_or_default(),
            parent_uuid: self.parent_uuid.unwrap_or_default(),
            kind,
            title: self.title.unwrap_or_default(),
            content_id,
            book_id,
            slug,
            level: self.level.unwrap_or(0),
            created_at: self.created_at.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
        }
    }
}

/// Body of a submit/poll export call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    /// Export format name.
    #[serde(rename = "type")]
    pub format: String,
    /// Always 0: a repeated identical request acts as a status poll.
    pub force: u8,
    /// Format options, JSON-encoded as a string (empty when unused).
    pub options: String,
}

impl ExportRequest {
    /// Builds the request the service expects for `format`.
    #[must_use]
    pub fn for_format(format: ExportFormat) -> Self {
        Self {
            format: format.api_name().to_string(),
            force: 0,
            options: format.request_options(),
        }
    }
}

/// `data` of an export response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportData {
    /// Job state (`pending`, `success`, ...).
    #[serde(default)]
    pub state: Option<String>,
    /// Download URL, present once the job succeeded; may be relative.
    #[serde(default)]
    pub url: Option<String>,
}

/// Response of a submit/poll export call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportResponse {
    /// Status reported in the body (or the HTTP status for error bodies).
    #[serde(default)]
    pub status: Option<u16>,
    /// Job payload.
    #[serde(default)]
    pub data: Option<ExportData>,
    /// Human-readable message, used by the service for refusals.
    #[serde(default)]
    pub message: Option<String>,
}

impl ExportResponse {
    /// Response whose job state is `state`.
    #[must_use]
    pub fn with_state(state: &str) -> Self {
        Self {
            status: Some(200),
            data: Some(ExportData {
                state: Some(state.to_string()),
                url: None,
            }),
            message: None,
        }
    }

    /// Successful response carrying a download URL.
    #[must_use]
    pub fn success(url: &str) -> Self {
        Self {
            status: Some(200),
            data: Some(ExportData {
                state: Some("success".to_string()),
                url: Some(url.to_string()),
            }),
            message: None,
        }
    }

    /// Refusal response with `status` and `message`.
    #[must_use]
    pub fn refusal(status: u16, message: &str) -> Self {
        Self {
            status: Some(status),
            data: None,
            message: Some(message.to_string()),
        }
    }

    /// The job state, if the response carries one.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.state.as_deref())
    }

    /// The download URL, if the response carries a non-empty one.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.url.as_deref())
            .filter(|u| !u.is_empty())
    }
}
