//! Export of whole knowledge bases.
//!
//! For one knowledge base the orchestrator fetches the catalog, resolves
//! paths and the selection, then walks the selected nodes strictly in
//! listing order. Each document goes through the export job, the download
//! and, for text formats, front-matter annotation. A failing document is
//! recorded in the [`ExportTally`] and the run moves on to the next one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::frontmatter::{Annotation, FrontMatter, annotate};
use super::job::{ExportJobRunner, ExportOutcome, JobSettings};
use super::layout::ArtifactLayout;
use super::progress::{ProgressEvent, ProgressSink};
use super::ExportFormat;
use crate::api::{ApiError, ExportApi};
use crate::catalog::{
    CatalogError, CatalogNode, Repository, ResolvedPath, Selection, document_count,
    resolve_paths, resolve_selection,
};
use crate::download::{DownloadError, HttpClient};

/// Failure exporting a knowledge base or one of its documents.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The catalog of a knowledge base could not be fetched.
    #[error("failed to fetch catalog of '{repository}': {source}")]
    Catalog {
        /// Knowledge base display name.
        repository: String,
        /// Underlying transport error.
        #[source]
        source: ApiError,
    },

    /// The catalog's parent references are malformed.
    #[error("catalog of '{repository}' is corrupt: {source}")]
    Corruption {
        /// Knowledge base display name.
        repository: String,
        /// Underlying catalog error.
        #[source]
        source: CatalogError,
    },

    /// The server refused the export or reported an unexpected result.
    #[error("export failed: {reason}")]
    JobFailed {
        /// Reason reported by the job runner.
        reason: String,
    },

    /// The export was still pending after every allowed poll.
    #[error("export still pending after {attempts} polls")]
    JobTimeout {
        /// Polls performed.
        attempts: u32,
    },

    /// The finished artifact could not be downloaded.
    #[error("download failed: {0}")]
    Download(#[source] DownloadError),

    /// A directory or placeholder file could not be created.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Path being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Creates a catalog fetch error.
    pub fn catalog(repository: impl Into<String>, source: ApiError) -> Self {
        Self::Catalog {
            repository: repository.into(),
            source,
        }
    }

    /// Creates a corruption error.
    pub fn corruption(repository: impl Into<String>, source: CatalogError) -> Self {
        Self::Corruption {
            repository: repository.into(),
            source,
        }
    }

    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// A document that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Document title.
    pub title: String,
    /// Why it failed.
    pub reason: String,
}

/// Per-knowledge-base result of an export run.
///
/// `total` counts selected documents; group nodes are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTally {
    /// Documents exported, unpublished placeholders included.
    pub succeeded: usize,
    /// Documents selected for export.
    pub total: usize,
    /// Every failed document with its reason, in export order.
    pub failures: Vec<DocumentFailure>,
    /// The run stopped early on cancellation.
    pub cancelled: bool,
}

impl ExportTally {
    /// Number of failed documents.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Returns true when every selected document was exported.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total && !self.cancelled
    }
}

/// Result of exporting one knowledge base in a multi-repository run.
#[derive(Debug)]
pub struct RepositoryReport {
    /// The knowledge base.
    pub repository: Repository,
    /// Its tally, or the error that skipped it.
    pub result: Result<ExportTally, ExportError>,
}

/// Run-wide export parameters.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Root directory artifacts are written below.
    pub output_dir: PathBuf,
    /// Requested format.
    pub format: ExportFormat,
    /// Poll bounds for each export job.
    pub job: JobSettings,
}

/// Drives catalog resolution, export jobs and downloads for knowledge bases.
///
/// Documents are processed one at a time. Cancellation is checked between
/// documents and between polls; a download in flight always runs to
/// completion or failure first.
pub struct ExportOrchestrator<'a> {
    api: &'a dyn ExportApi,
    downloader: &'a HttpClient,
    progress: &'a dyn ProgressSink,
    layout: ArtifactLayout,
    format: ExportFormat,
    job: JobSettings,
    interrupted: Arc<AtomicBool>,
}

impl<'a> ExportOrchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        api: &'a dyn ExportApi,
        downloader: &'a HttpClient,
        progress: &'a dyn ProgressSink,
        options: ExportOptions,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            api,
            downloader,
            progress,
            layout: ArtifactLayout::new(options.output_dir),
            format: options.format,
            job: options.job,
            interrupted,
        }
    }

    /// Exports each `(repository, selection)` pair in order.
    ///
    /// A knowledge base whose catalog cannot be fetched or resolved is
    /// reported and skipped. Cancellation stops before the next knowledge
    /// base starts.
    pub async fn export_repositories(
        &self,
        targets: &[(Repository, Selection)],
    ) -> Vec<RepositoryReport> {
        let mut reports = Vec::with_capacity(targets.len());
        for (repository, selection) in targets {
            if self.is_interrupted() {
                info!("cancelled; skipping remaining knowledge bases");
                break;
            }
            let result = self.export_repository(repository, selection).await;
            if let Err(error) = &result {
                warn!(repository = %repository.name, error = %error, "skipping knowledge base");
            }
            reports.push(RepositoryReport {
                repository: repository.clone(),
                result,
            });
        }
        reports
    }

    /// Fetches the catalog of `repository` and exports `selection` from it.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Catalog`] if the catalog cannot be fetched and
    /// [`ExportError::Corruption`] if its parent references loop. Document
    /// failures never surface here; they are counted in the tally.
    #[instrument(skip(self, repository, selection), fields(repository = %repository.name, book_id = repository.id))]
    pub async fn export_repository(
        &self,
        repository: &Repository,
        selection: &Selection,
    ) -> Result<ExportTally, ExportError> {
        let nodes = self
            .api
            .list_catalog_nodes(repository)
            .await
            .map_err(|source| ExportError::catalog(&repository.name, source))?;
        debug!(nodes = nodes.len(), "catalog fetched");
        self.export_nodes(repository, &nodes, selection).await
    }

    /// Exports `selection` out of an already fetched catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Corruption`] if the catalog's parent
    /// references loop.
    pub async fn export_nodes(
        &self,
        repository: &Repository,
        nodes: &[CatalogNode],
        selection: &Selection,
    ) -> Result<ExportTally, ExportError> {
        let paths = resolve_paths(nodes)
            .map_err(|source| ExportError::corruption(&repository.name, source))?;
        let targets = resolve_selection(nodes, selection);
        let total = document_count(&targets);

        let mut tally = ExportTally {
            total,
            ..ExportTally::default()
        };
        if total == 0 {
            info!("no documents selected");
        }

        self.progress.on_event(&ProgressEvent::RepositoryStarted {
            name: &repository.name,
            total_documents: total,
        });

        let mut index = 0;
        for node in targets {
            if self.is_interrupted() {
                info!(
                    exported = tally.succeeded,
                    total, "cancelled; stopping before next document"
                );
                tally.cancelled = true;
                break;
            }
            let Some(path) = paths.get(&node.uuid) else {
                continue;
            };

            if node.is_group() {
                self.ensure_group_dir(repository, path).await;
                continue;
            }

            index += 1;
            self.progress.on_event(&ProgressEvent::DocumentStarted {
                title: &node.title,
                index,
                total,
            });

            match self.export_document(repository, node, path).await {
                Ok(()) => {
                    tally.succeeded += 1;
                    self.progress.on_event(&ProgressEvent::DocumentFinished {
                        title: &node.title,
                        failure: None,
                    });
                }
                Err(error) => {
                    let reason = error.to_string();
                    warn!(doc_id = node.content_id, title = %node.title, reason = %reason, "document export failed");
                    self.progress.on_event(&ProgressEvent::DocumentFinished {
                        title: &node.title,
                        failure: Some(&reason),
                    });
                    tally.failures.push(DocumentFailure {
                        title: node.title.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            succeeded = tally.succeeded,
            failed = tally.failed(),
            total,
            "knowledge base export finished"
        );
        self.progress.on_event(&ProgressEvent::RepositoryFinished {
            name: &repository.name,
            succeeded: tally.succeeded,
            total,
        });
        Ok(tally)
    }

    async fn ensure_group_dir(&self, repository: &Repository, path: &ResolvedPath) {
        let dir = self.layout.group_dir(repository, path);
        if let Err(error) = tokio::fs::create_dir_all(&dir).await {
            warn!(path = %dir.display(), error = %error, "could not create group directory");
        }
    }

    async fn export_document(
        &self,
        repository: &Repository,
        node: &CatalogNode,
        path: &ResolvedPath,
    ) -> Result<(), ExportError> {
        let runner = ExportJobRunner::new(self.api, self.job, Arc::clone(&self.interrupted));
        let file = self.layout.document_file(repository, path, self.format);

        match runner.run_export(node, self.format).await {
            ExportOutcome::Success(url) => {
                let title = node.title.as_str();
                self.downloader
                    .download(url.as_str(), &file, |completed, total| {
                        self.progress.on_event(&ProgressEvent::Transfer {
                            title,
                            completed,
                            total,
                        });
                    })
                    .await
                    .map_err(ExportError::Download)?;
            }
            ExportOutcome::Unpublished => {
                info!(title = %node.title, "document unpublished; writing empty placeholder");
                touch(&file).await?;
            }
            ExportOutcome::TimedOut => {
                return Err(ExportError::JobTimeout {
                    attempts: self.job.max_attempts,
                });
            }
            ExportOutcome::Failed(reason) => return Err(ExportError::JobFailed { reason }),
        }

        if self.format.is_text() {
            self.annotate(node, &file).await;
        }
        Ok(())
    }

    async fn annotate(&self, node: &CatalogNode, file: &Path) {
        let front_matter = FrontMatter::for_document(node, Local::now());
        match annotate(file, &front_matter).await {
            Ok(Annotation::Inserted) => debug!(path = %file.display(), "front matter added"),
            Ok(Annotation::AlreadyPresent | Annotation::MissingFile) => {}
            Err(error) => {
                warn!(path = %file.display(), error = %error, "could not add front matter");
            }
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Creates `file` and its parents without truncating an existing file.
async fn touch(file: &Path) -> Result<(), ExportError> {
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ExportError::filesystem(parent, source))?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .await
        .map_err(|source| ExportError::filesystem(file, source))?;
    Ok(())
}
