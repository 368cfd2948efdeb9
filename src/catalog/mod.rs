//! Knowledge-base catalog model and tree resolution.
//!
//! A catalog arrives from the remote service as a flat, ordered list of
//! nodes that point at their parents. This module rebuilds the hierarchy
//! from those back-references and answers the two questions an export run
//! needs:
//!
//! - [`resolve_paths`] - where on disk each node lives, as sanitized path
//!   segments from the root down to the node
//! - [`resolve_selection`] - which nodes a partial selection actually covers,
//!   with groups expanded to their full subtree and listing order preserved
//!
//! Derived orderings never re-sort: every output is a subsequence of the
//! input node list.

mod error;
mod model;
mod path;
mod selection;

pub use error::CatalogError;
pub use model::{CatalogNode, NodeKind, Repository};
pub use path::{
    CatalogIndex, MAX_SEGMENT_CHARS, ResolvedPath, ResolvedPaths, TreeEntry, UNTITLED,
    resolve_paths, sanitize_segment,
};
pub use selection::{Selection, document_count, resolve_selection};
