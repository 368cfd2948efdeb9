//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use exporter_core::ExportFormat;
use exporter_core::config::Overrides;

/// Bulk export knowledge-base documents, keeping their catalog hierarchy.
///
/// Sign in with a browser, export its cookies in Netscape format and run
/// `yuque-exporter auth import <cookies.txt>` once before exporting.
#[derive(Parser, Debug)]
#[command(name = "yuque-exporter")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/yuque-exporter/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Service origin, e.g. https://www.yuque.com
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Saved session cookies (default: ~/.yuque/cookies.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub cookies_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the knowledge bases visible to the saved session
    Repos,

    /// Show the catalog tree of one knowledge base
    Catalog {
        /// Knowledge base id, slug or name
        #[arg(short, long)]
        repo: String,
    },

    /// Export documents from one or more knowledge bases
    Export(ExportArgs),

    /// Manage the saved session
    #[command(subcommand)]
    Auth(AuthCommand),
}

/// Arguments of the `export` command.
#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Knowledge base id, slug or name (repeatable)
    #[arg(short, long, required = true)]
    pub repo: Vec<String>,

    /// Catalog node uuid to export; groups include their subtree (repeatable, default: everything)
    #[arg(short, long, value_name = "UUID")]
    pub select: Vec<String>,

    /// Export format: markdown, pdf, word or lakebook
    #[arg(short, long)]
    pub format: Option<ExportFormat>,

    /// Output directory (default: ./yuque_export)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Polls before a pending export is given up (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub max_poll_attempts: Option<u32>,

    /// Wait between polls in milliseconds (100-60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(100..=60000))]
    pub poll_interval_ms: Option<u64>,
}

/// `auth` subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Check whether the saved session is still accepted
    Status,

    /// Import cookies from a Netscape cookie file exported from a browser
    Import {
        /// Cookie file path, or `-` for stdin
        file: PathBuf,

        /// User agent of the browser the cookies came from
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Delete the saved session
    Clear,
}

impl Args {
    /// Command-line values that override the config file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            base_url: self.base_url.clone(),
            cookies_file: self.cookies_file.clone(),
            ..Overrides::default()
        };
        if let Command::Export(export) = &self.command {
            overrides.output_dir.clone_from(&export.output);
            overrides.format = export.format;
            overrides.max_poll_attempts = export.max_poll_attempts;
            overrides.poll_interval_ms = export.poll_interval_ms;
        }
        overrides
    }
}
