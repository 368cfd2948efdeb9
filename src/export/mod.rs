//! Export orchestration: per-document job state machine, artifact layout,
//! front-matter annotation and the knowledge-base level driver.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use exporter_core::api::ExportApi;
//! use exporter_core::catalog::Selection;
//! use exporter_core::download::HttpClient;
//! use exporter_core::export::{
//!     ExportFormat, ExportOptions, ExportOrchestrator, JobSettings, NoopProgress,
//! };
//!
//! # async fn run(api: &dyn ExportApi, http: &HttpClient) -> Result<(), Box<dyn std::error::Error>> {
//! let repositories = api.list_repositories().await?;
//! let options = ExportOptions {
//!     output_dir: "exports".into(),
//!     format: ExportFormat::Markdown,
//!     job: JobSettings::default(),
//! };
//! let orchestrator = ExportOrchestrator::new(
//!     api,
//!     http,
//!     &NoopProgress,
//!     options,
//!     Arc::new(AtomicBool::new(false)),
//! );
//! for repository in &repositories {
//!     let tally = orchestrator.export_repository(repository, &Selection::All).await?;
//!     println!("{}: {}/{}", repository.name, tally.succeeded, tally.total);
//! }
//! # Ok(())
//! # }
//! ```

mod format;
mod frontmatter;
mod job;
mod layout;
mod orchestrator;
mod progress;

pub use format::{ExportFormat, UnknownFormat};
pub use frontmatter::{Annotation, FrontMatter, annotate};
pub use job::{
    DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL, ExportJob, ExportJobRunner, ExportOutcome,
    JobSettings, JobState, is_unpublished_signal, transition,
};
pub use layout::ArtifactLayout;
pub use orchestrator::{
    DocumentFailure, ExportError, ExportOptions, ExportOrchestrator, ExportTally,
    RepositoryReport,
};
pub use progress::{NoopProgress, ProgressEvent, ProgressSink};
