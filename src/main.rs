//! CLI entry point for yuque-exporter.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use exporter_core::config::{FileConfig, Settings, default_config_path};
use tracing::debug;

mod cli;
mod commands;
mod progress_ui;

use cli::{Args, AuthCommand, Command};

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything requested was done.
    Success,
    /// Some of the requested work failed.
    Partial,
    /// Nothing requested succeeded.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

/// Maps exported/failed document counts to the process outcome.
pub(crate) fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    init_tracing(default_level);
    debug!(?args, "CLI arguments parsed");

    let settings = load_settings(&args)?;
    debug!(?settings, "effective settings");

    let exit = match &args.command {
        Command::Repos => commands::run_repos_command(&settings).await?,
        Command::Catalog { repo } => commands::run_catalog_command(&settings, repo).await?,
        Command::Export(export) => {
            commands::run_export_command(&settings, export, args.quiet).await?
        }
        Command::Auth(AuthCommand::Status) => commands::run_auth_status_command(&settings).await?,
        Command::Auth(AuthCommand::Import { file, user_agent }) => {
            commands::run_auth_import_command(&settings, file, user_agent.as_deref())?
        }
        Command::Auth(AuthCommand::Clear) => commands::run_auth_clear_command(&settings)?,
    };
    Ok(exit.into())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}

fn load_settings(args: &Args) -> Result<Settings> {
    let file = match args.config.clone().or_else(default_config_path) {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            FileConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => FileConfig::default(),
    };
    Settings::resolve(file, args.overrides()).context("invalid settings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }
}
