//! Per-document export job state machine.
//!
//! The service renders exports asynchronously: the first request submits
//! the job, and repeating the identical request reports its progress. The
//! protocol is split into a pure [`transition`] over [`JobState`] and a
//! thin async driver, [`ExportJobRunner`], which owns all I/O and waiting.
//!
//! ```text
//! Submitted ──pending──▶ Pending ──pending──▶ Pending ... (bounded)
//!     │                     │
//!     ├──success+url──▶ Success ◀──success+url──┤
//!     ├──unpublished──▶ Unpublished             │
//!     └──anything else─▶ Failed ◀──anything else┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::ExportFormat;
use crate::api::{ExportApi, ExportRequest, ExportResponse, resolve_download_url};
use crate::catalog::CatalogNode;

/// Default number of polls before a pending job is given up on.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Default wait between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Message the service answers with when a document has never been published.
const UNPUBLISHED_MESSAGE: &str = "请发布后再导出";

/// Returns true when `response` says the document must be published first.
///
/// The service offers no dedicated code for this refusal, so detection
/// matches its message text. Keep every such check behind this predicate.
#[must_use]
pub fn is_unpublished_signal(response: &ExportResponse) -> bool {
    response
        .message
        .as_deref()
        .is_some_and(|message| message.contains(UNPUBLISHED_MESSAGE))
}

/// State of one document's export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// The first request has been sent.
    Submitted,
    /// The server is still rendering.
    Pending,
    /// Rendering finished; carries the raw (possibly relative) download URL.
    Success(String),
    /// The server refused or reported an unexpected result.
    Failed(String),
    /// The document has not been published and cannot be exported.
    Unpublished,
}

impl JobState {
    /// Terminal states never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failed(_) | Self::Unpublished)
    }
}

/// Applies one service response to the current job state.
///
/// The unpublished refusal is only meaningful as the answer to the initial
/// submission; seen while polling it is an unexpected payload and fails the
/// job. Terminal states are returned unchanged.
#[must_use]
pub fn transition(state: &JobState, response: &ExportResponse) -> JobState {
    match state {
        JobState::Submitted if is_unpublished_signal(response) => JobState::Unpublished,
        JobState::Submitted | JobState::Pending => classify_response(response),
        terminal => terminal.clone(),
    }
}

fn classify_response(response: &ExportResponse) -> JobState {
    match response.state() {
        Some("pending") => JobState::Pending,
        Some("success") => match response.download_url() {
            Some(url) => JobState::Success(url.to_string()),
            None => JobState::Failed("export reported success without a download URL".to_string()),
        },
        Some(other) => JobState::Failed(
            response
                .message
                .clone()
                .unwrap_or_else(|| format!("export ended in state '{other}'")),
        ),
        None => JobState::Failed(
            response
                .message
                .clone()
                .unwrap_or_else(|| "export response carried no job state".to_string()),
        ),
    }
}

/// Ephemeral bookkeeping for one document's export attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// Content id the job was submitted for.
    pub content_id: u64,
    /// Requested format.
    pub format: ExportFormat,
    /// Current state.
    pub state: JobState,
    /// Polls performed after the initial submission.
    pub attempt: u32,
}

impl ExportJob {
    /// A freshly submitted job.
    #[must_use]
    pub fn new(content_id: u64, format: ExportFormat) -> Self {
        Self {
            content_id,
            format,
            state: JobState::Submitted,
            attempt: 0,
        }
    }

    /// Advances the job with a service response.
    pub fn apply(&mut self, response: &ExportResponse) {
        self.state = transition(&self.state, response);
    }

    /// Download URL, set only once the job succeeded.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        match &self.state {
            JobState::Success(url) => Some(url),
            _ => None,
        }
    }
}

/// Terminal result of driving one export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Artifact is ready at this absolute URL.
    Success(Url),
    /// Document is unpublished; callers produce an empty placeholder.
    Unpublished,
    /// Still pending after the configured number of polls.
    TimedOut,
    /// Transport failure, explicit refusal, unexpected payload, or cancellation.
    Failed(String),
}

/// Poll bounds for one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// Polls allowed after the initial submission.
    pub max_attempts: u32,
    /// Wait before each poll.
    pub poll_interval: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Drives export jobs to a terminal [`ExportOutcome`].
pub struct ExportJobRunner<'a> {
    api: &'a dyn ExportApi,
    settings: JobSettings,
    interrupted: Arc<AtomicBool>,
}

impl<'a> ExportJobRunner<'a> {
    /// Creates a runner polling `api` within `settings`.
    #[must_use]
    pub fn new(api: &'a dyn ExportApi, settings: JobSettings, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            api,
            settings,
            interrupted,
        }
    }

    /// Exports `document` as `format`.
    ///
    /// Expected non-success results are outcomes, not errors. A transport
    /// failure ends the job at once without consuming further polls.
    #[instrument(
        skip(self, document, format),
        fields(doc_id = document.content_id, title = %document.title, format = %format)
    )]
    pub async fn run_export(&self, document: &CatalogNode, format: ExportFormat) -> ExportOutcome {
        if document.content_id == 0 {
            return ExportOutcome::Failed("document has no content id".to_string());
        }

        let request = ExportRequest::for_format(format);
        let mut job = ExportJob::new(document.content_id, format);

        match self.api.submit_export(job.content_id, &request).await {
            Ok(response) => job.apply(&response),
            Err(error) => return ExportOutcome::Failed(error.to_string()),
        }
        debug!(state = ?job.state, "export submitted");

        while job.state == JobState::Pending {
            if job.attempt >= self.settings.max_attempts {
                warn!(attempts = job.attempt, "export still pending; giving up");
                return ExportOutcome::TimedOut;
            }
            if self.interrupted.load(Ordering::SeqCst) {
                return ExportOutcome::Failed("cancelled while waiting for export".to_string());
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            job.attempt += 1;

            match self.api.submit_export(job.content_id, &request).await {
                Ok(response) => job.apply(&response),
                Err(error) => return ExportOutcome::Failed(error.to_string()),
            }
            debug!(attempt = job.attempt, state = ?job.state, "export polled");
        }

        match job.state {
            JobState::Success(raw) => match resolve_download_url(self.api.base_url(), &raw) {
                Ok(url) => {
                    info!(attempts = job.attempt, url = %url, "export ready");
                    ExportOutcome::Success(url)
                }
                Err(error) => ExportOutcome::Failed(error.to_string()),
            },
            JobState::Unpublished => ExportOutcome::Unpublished,
            JobState::Failed(reason) => ExportOutcome::Failed(reason),
            JobState::Submitted | JobState::Pending => {
                ExportOutcome::Failed("export ended without a terminal state".to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::catalog::NodeKind;
    use crate::test_support::fake_api::ScriptedApi;

    fn document() -> CatalogNode {
        CatalogNode::new("B", "A", NodeKind::Document, "Intro").with_content_id(7)
    }

    fn settings(max_attempts: u32) -> JobSettings {
        JobSettings {
            max_attempts,
            poll_interval: Duration::from_millis(1500),
        }
    }

    fn not_interrupted() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    // ==================== transition ====================

    #[test]
    fn test_transition_submitted_pending() {
        let next = transition(&JobState::Submitted, &ExportResponse::with_state("pending"));
        assert_eq!(next, JobState::Pending);
    }

    #[test]
    fn test_transition_success_keeps_raw_url() {
        let next = transition(&JobState::Pending, &ExportResponse::success("/f/x"));
        assert_eq!(next, JobState::Success("/f/x".to_string()));
    }

    #[test]
    fn test_transition_success_without_url_fails() {
        let next = transition(&JobState::Submitted, &ExportResponse::with_state("success"));
        assert!(matches!(next, JobState::Failed(_)));
    }

    #[test]
    fn test_transition_unpublished_only_from_submitted() {
        let refusal = ExportResponse::refusal(400, "请发布后再导出");
        assert_eq!(transition(&JobState::Submitted, &refusal), JobState::Unpublished);
        assert_eq!(
            transition(&JobState::Pending, &refusal),
            JobState::Failed("请发布后再导出".to_string())
        );
    }

    #[test]
    fn test_transition_unknown_state_fails_with_message() {
        let mut response = ExportResponse::with_state("error");
        assert_eq!(
            transition(&JobState::Pending, &response),
            JobState::Failed("export ended in state 'error'".to_string())
        );
        response.message = Some("quota exceeded".to_string());
        assert_eq!(
            transition(&JobState::Pending, &response),
            JobState::Failed("quota exceeded".to_string())
        );
    }

    #[test]
    fn test_transition_other_refusal_fails() {
        let refusal = ExportResponse::refusal(400, "no permission");
        assert_eq!(
            transition(&JobState::Submitted, &refusal),
            JobState::Failed("no permission".to_string())
        );
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let pending = ExportResponse::with_state("pending");
        for state in [
            JobState::Success("/f/x".to_string()),
            JobState::Failed("x".to_string()),
            JobState::Unpublished,
        ] {
            assert!(state.is_terminal());
            assert_eq!(transition(&state, &pending), state);
        }
    }

    #[test]
    fn test_export_job_download_url_only_on_success() {
        let mut job = ExportJob::new(7, ExportFormat::Markdown);
        assert!(job.download_url().is_none());
        job.apply(&ExportResponse::success("/f/x"));
        assert_eq!(job.download_url(), Some("/f/x"));
    }

    #[test]
    fn test_is_unpublished_signal_matches_message_substring() {
        assert!(is_unpublished_signal(&ExportResponse::refusal(
            400,
            "文档未发布：请发布后再导出"
        )));
        assert!(!is_unpublished_signal(&ExportResponse::with_state("pending")));
    }

    // ==================== runner ====================

    #[tokio::test(start_paused = true)]
    async fn test_three_pending_then_success_waits_three_intervals() {
        let api = ScriptedApi::with_exports(vec![
            Ok(ExportResponse::with_state("pending")),
            Ok(ExportResponse::with_state("pending")),
            Ok(ExportResponse::with_state("pending")),
            Ok(ExportResponse::success("/f/x")),
        ]);
        let runner = ExportJobRunner::new(&api, settings(120), not_interrupted());

        let started = tokio::time::Instant::now();
        let outcome = runner.run_export(&document(), ExportFormat::Markdown).await;

        assert_eq!(
            outcome,
            ExportOutcome::Success(Url::parse("https://www.yuque.com/f/x").unwrap())
        );
        assert_eq!(api.export_calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_pending_times_out_after_max_attempts() {
        let api = ScriptedApi::with_exports(
            (0..10)
                .map(|_| Ok(ExportResponse::with_state("pending")))
                .collect(),
        );
        let runner = ExportJobRunner::new(&api, settings(2), not_interrupted());

        let outcome = runner.run_export(&document(), ExportFormat::Pdf).await;

        assert_eq!(outcome, ExportOutcome::TimedOut);
        assert_eq!(api.export_calls(), 3, "one submission plus two polls");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpublished_refusal_is_unpublished_outcome() {
        let api =
            ScriptedApi::with_exports(vec![Ok(ExportResponse::refusal(400, "请发布后再导出"))]);
        let runner = ExportJobRunner::new(&api, settings(120), not_interrupted());

        let outcome = runner.run_export(&document(), ExportFormat::Markdown).await;

        assert_eq!(outcome, ExportOutcome::Unpublished);
        assert_eq!(api.export_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_fails_immediately() {
        let api = ScriptedApi::with_exports(vec![
            Ok(ExportResponse::with_state("pending")),
            Err(ApiError::Timeout {
                url: "https://www.yuque.com/api/docs/7/export".to_string(),
            }),
            Ok(ExportResponse::success("/f/x")),
        ]);
        let runner = ExportJobRunner::new(&api, settings(120), not_interrupted());

        let outcome = runner.run_export(&document(), ExportFormat::Markdown).await;

        assert!(matches!(outcome, ExportOutcome::Failed(ref reason) if reason.contains("timeout")));
        assert_eq!(api.export_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_between_polls() {
        let api = ScriptedApi::with_exports(vec![
            Ok(ExportResponse::with_state("pending")),
            Ok(ExportResponse::success("/f/x")),
        ]);
        let runner = ExportJobRunner::new(&api, settings(120), Arc::new(AtomicBool::new(true)));

        let outcome = runner.run_export(&document(), ExportFormat::Markdown).await;

        assert!(matches!(outcome, ExportOutcome::Failed(ref reason) if reason.contains("cancelled")));
        assert_eq!(api.export_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_id_fails_without_calling_api() {
        let api = ScriptedApi::with_exports(Vec::new());
        let runner = ExportJobRunner::new(&api, settings(120), not_interrupted());
        let node = CatalogNode::new("B", "", NodeKind::Document, "Intro");

        let outcome = runner.run_export(&node, ExportFormat::Markdown).await;

        assert!(matches!(outcome, ExportOutcome::Failed(_)));
        assert_eq!(api.export_calls(), 0);
    }
}
