//! On-disk placement of exported artifacts.
//!
//! `<root>/<repo>/<parent segments...>/<title>.<ext>`, every component
//! sanitized. Groups map to directories at their own full path.

use std::path::{Path, PathBuf};

use super::ExportFormat;
use crate::catalog::{Repository, ResolvedPath, sanitize_segment};

/// Computes artifact paths below an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything exported from `repository`.
    #[must_use]
    pub fn repository_dir(&self, repository: &Repository) -> PathBuf {
        self.root.join(sanitize_segment(&repository.name))
    }

    /// Directory a group node maps to.
    #[must_use]
    pub fn group_dir(&self, repository: &Repository, path: &ResolvedPath) -> PathBuf {
        self.repository_dir(repository).join(path.to_relative_dir())
    }

    /// File a document node is written to.
    #[must_use]
    pub fn document_file(
        &self,
        repository: &Repository,
        path: &ResolvedPath,
        format: ExportFormat,
    ) -> PathBuf {
        let mut file = self.repository_dir(repository);
        file.extend(path.parent_segments());
        file.push(format!("{}.{}", path.file_stem(), format.extension()));
        file
    }
}
