//! Progress events emitted while exporting.
//!
//! The orchestrator reports through a [`ProgressSink`] so terminal display
//! stays outside the library. Events arrive in run order on the exporting
//! task.

/// One step of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// A knowledge base is about to be exported.
    RepositoryStarted {
        /// Knowledge base display name.
        name: &'a str,
        /// Documents selected for export.
        total_documents: usize,
    },
    /// Work on one document begins (`index` is 1-based).
    DocumentStarted {
        /// Document title.
        title: &'a str,
        /// Position among the selected documents.
        index: usize,
        /// Number of selected documents.
        total: usize,
    },
    /// Artifact transfer progress: `(completed, total)` units.
    ///
    /// `completed == 0` with `Some(total)` announces the size before
    /// streaming; afterwards `completed` carries the bytes of one chunk.
    Transfer {
        /// Document title.
        title: &'a str,
        /// Bytes in this update.
        completed: u64,
        /// Announced size, present only on the initial update.
        total: Option<u64>,
    },
    /// A document reached its final result.
    DocumentFinished {
        /// Document title.
        title: &'a str,
        /// `None` on success, otherwise the failure reason.
        failure: Option<&'a str>,
    },
    /// A knowledge base finished with this tally.
    RepositoryFinished {
        /// Knowledge base display name.
        name: &'a str,
        /// Documents exported successfully (unpublished placeholders included).
        succeeded: usize,
        /// Documents attempted.
        total: usize,
    },
}

/// Receives progress events from an export run.
pub trait ProgressSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &ProgressEvent<'_>);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: &ProgressEvent<'_>) {}
}
