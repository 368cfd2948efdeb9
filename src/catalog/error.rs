//! Error types for catalog resolution.

use thiserror::Error;

/// Errors raised while rebuilding a catalog tree.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Parent references loop back on themselves, so the node never reaches a root.
    #[error(
        "catalog corruption at node {uuid}: parent chain exceeds {limit} links (cycle in parent references)"
    )]
    Corruption {
        /// Node whose ancestor walk did not terminate.
        uuid: String,
        /// Walk bound that was exceeded (the catalog size).
        limit: usize,
    },
}

impl CatalogError {
    /// Creates a corruption error for the node whose walk was cut off.
    pub fn corruption(uuid: impl Into<String>, limit: usize) -> Self {
        Self::Corruption {
            uuid: uuid.into(),
            limit,
        }
    }
}
