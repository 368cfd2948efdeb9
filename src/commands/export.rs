//! `export` command: export selected documents of one or more knowledge bases.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use exporter_core::export::{NoopProgress, ProgressSink, RepositoryReport};
use exporter_core::{
    ExportApi, ExportOptions, ExportOrchestrator, HttpClient, Repository, RetryPolicy, Selection,
    Settings,
};
use tracing::{info, warn};

use super::{connect, find_repository};
use crate::cli::ExportArgs;
use crate::progress_ui::{TerminalProgress, should_use_progress};
use crate::{ProcessExit, determine_exit_outcome};

pub(crate) async fn run_export_command(
    settings: &Settings,
    args: &ExportArgs,
    quiet: bool,
) -> Result<ProcessExit> {
    let api = connect(settings)?;
    let repositories = api.list_repositories().await.context("failed to list knowledge bases")?;

    let selection = Selection::from_chosen(args.select.clone());
    let targets = args
        .repo
        .iter()
        .map(|key| Ok((find_repository(&repositories, key)?.clone(), selection.clone())))
        .collect::<Result<Vec<(Repository, Selection)>>>()?;

    let downloader = HttpClient::new(
        api.http().clone(),
        RetryPolicy::with_max_attempts(settings.download_max_retries),
    );
    let progress: Box<dyn ProgressSink> =
        if should_use_progress(std::io::stderr().is_terminal(), quiet) {
            Box::new(TerminalProgress::new())
        } else {
            Box::new(NoopProgress)
        };

    let interrupted = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_flag.store(true, Ordering::SeqCst);
            warn!("interrupt received; stopping after the current document");
        }
    });

    info!(
        repositories = targets.len(),
        format = %settings.format,
        output = %settings.output_dir.display(),
        "starting export"
    );
    let orchestrator = ExportOrchestrator::new(
        &api,
        &downloader,
        progress.as_ref(),
        ExportOptions {
            output_dir: settings.output_dir.clone(),
            format: settings.format,
            job: settings.job,
        },
        Arc::clone(&interrupted),
    );
    let reports = orchestrator.export_repositories(&targets).await;

    let (completed, failed) = summarize(&reports, targets.len());
    if interrupted.load(Ordering::SeqCst) {
        warn!("export interrupted");
    }
    Ok(determine_exit_outcome(completed, failed))
}

/// Prints one line per knowledge base and returns `(exported, not exported)`.
///
/// A skipped or never-started knowledge base counts as one failure.
fn summarize(reports: &[RepositoryReport], requested: usize) -> (usize, usize) {
    let mut completed = 0;
    let mut failed = requested.saturating_sub(reports.len());
    for report in reports {
        let name = &report.repository.name;
        match &report.result {
            Ok(tally) => {
                println!("{name}: {}/{} exported", tally.succeeded, tally.total);
                for failure in &tally.failures {
                    println!("  failed: {}: {}", failure.title, failure.reason);
                }
                if tally.cancelled {
                    println!("  cancelled before finishing");
                }
                completed += tally.succeeded;
                failed += tally.total - tally.succeeded;
            }
            Err(error) => {
                println!("{name}: skipped: {error}");
                failed += 1;
            }
        }
    }
    (completed, failed)
}
