//! Catalog and repository records as the rest of the crate sees them.

use std::fmt;

/// Kind of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Organizational heading with no exportable content of its own.
    Group,
    /// Exportable document.
    Document,
}

impl NodeKind {
    /// Maps the service's `type` field onto a node kind.
    ///
    /// The service labels headings `TITLE`; every other value is a document.
    #[must_use]
    pub fn from_api_type(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("TITLE") {
            Self::Group
        } else {
            Self::Document
        }
    }
}

/// One entry of a knowledge base's table of contents.
///
/// Nodes are immutable after fetch and are always handled in the order the
/// service delivered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNode {
    /// Stable identity of the node.
    pub uuid: String,
    /// Identity of the parent node; empty for roots.
    pub parent_uuid: String,
    /// Group or document.
    pub kind: NodeKind,
    /// Display title, also used to derive file and directory names.
    pub title: String,
    /// Content identifier used by the export endpoint (0 for groups).
    pub content_id: u64,
    /// Owning knowledge base.
    pub book_id: u64,
    /// Document slug used in the public URL.
    pub slug: String,
    /// Nesting depth as reported by the service.
    pub level: u32,
    /// Creation timestamp as reported by the service.
    pub created_at: String,
    /// Last update timestamp as reported by the service.
    pub updated_at: String,
}

impl CatalogNode {
    /// Creates a node with only the tree-relevant fields populated.
    #[must_use]
    pub fn new(
        uuid: impl Into<String>,
        parent_uuid: impl Into<String>,
        kind: NodeKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            parent_uuid: parent_uuid.into(),
            kind,
            title: title.into(),
            content_id: 0,
            book_id: 0,
            slug: String::new(),
            level: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Sets the export content id.
    #[must_use]
    pub fn with_content_id(mut self, content_id: u64) -> Self {
        self.content_id = content_id;
        self
    }

    /// Sets the owning knowledge base id.
    #[must_use]
    pub fn with_book_id(mut self, book_id: u64) -> Self {
        self.book_id = book_id;
        self
    }

    /// Returns true for organizational group nodes.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    /// Returns true when the node names a parent at all.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        !self.parent_uuid.is_empty()
    }
}

/// Summary of a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Knowledge base id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Owner login handle.
    pub owner_login: String,
    /// Free-form description.
    pub description: String,
    /// Number of documents reported by the service.
    pub doc_count: u64,
    /// Whether the knowledge base is publicly visible.
    pub public: bool,
}

impl Repository {
    /// Public URL of the knowledge base under `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.owner_login,
            self.slug
        )
    }

    /// Returns true when `key` names this repository by id, slug, or display name.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim();
        key == self.id.to_string() || key == self.slug || key == self.name
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visibility = if self.public { "public" } else { "private" };
        write!(
            f,
            "{} ({} docs, {visibility})",
            self.name, self.doc_count
        )
    }
}
