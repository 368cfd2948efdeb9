//! Terminal progress display for export runs.

use std::sync::Mutex;

use exporter_core::export::{ProgressEvent, ProgressSink};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Returns true when bars should be drawn at all.
pub(crate) fn should_use_progress(stderr_is_terminal: bool, quiet: bool) -> bool {
    stderr_is_terminal && !quiet && !is_dumb_terminal()
}

fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

struct Bars {
    documents: ProgressBar,
    transfer: ProgressBar,
}

/// indicatif rendering: one bar per knowledge base, one per transfer.
pub(crate) struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<Option<Bars>>,
}

impl TerminalProgress {
    pub(crate) fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(None),
        }
    }

    fn with_bars(&self, f: impl FnOnce(&Bars)) {
        let guard = self
            .bars
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bars) = guard.as_ref() {
            f(bars);
        }
    }
}

fn documents_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::with_template("  {msg} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn short_title(title: &str) -> String {
    const MAX_CHARS: usize = 24;
    if title.chars().count() <= MAX_CHARS {
        title.to_string()
    } else {
        let mut short: String = title.chars().take(MAX_CHARS).collect();
        short.push_str("...");
        short
    }
}

impl ProgressSink for TerminalProgress {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::RepositoryStarted {
                name,
                total_documents,
            } => {
                let documents = self.multi.add(ProgressBar::new(*total_documents as u64));
                documents.set_style(documents_style());
                documents.set_prefix(name.to_string());
                let transfer = self.multi.add(ProgressBar::new(0));
                transfer.set_style(transfer_style());
                *self
                    .bars
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) =
                    Some(Bars { documents, transfer });
            }
            ProgressEvent::DocumentStarted { title, .. } => {
                self.with_bars(|bars| bars.documents.set_message(title.to_string()));
            }
            ProgressEvent::Transfer {
                title,
                completed,
                total,
            } => self.with_bars(|bars| {
                if let Some(total) = total {
                    bars.transfer.reset();
                    bars.transfer.set_length(*total);
                    bars.transfer.set_message(short_title(title));
                }
                bars.transfer.inc(*completed);
            }),
            ProgressEvent::DocumentFinished { title, failure } => self.with_bars(|bars| {
                bars.transfer.reset();
                bars.transfer.set_length(0);
                bars.transfer.set_message("");
                if let Some(reason) = failure {
                    bars.documents.println(format!("  failed: {title}: {reason}"));
                }
                bars.documents.inc(1);
            }),
            ProgressEvent::RepositoryFinished { .. } => {
                let finished = self
                    .bars
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take();
                if let Some(bars) = finished {
                    bars.transfer.finish_and_clear();
                    bars.documents.finish_and_clear();
                }
            }
        }
    }
}
