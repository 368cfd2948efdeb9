//! Exporter Core Library
//!
//! Bulk export of knowledge-base documents while keeping their catalog
//! hierarchy on disk.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Catalog tree reconstruction, path resolution and selection
//! - [`api`] - Remote API surface (knowledge bases, catalogs, export jobs)
//! - [`export`] - Export job state machine, artifact layout, front matter and
//!   the knowledge-base level orchestrator
//! - [`download`] - Streaming artifact downloads with retry
//! - [`auth`] - Session cookies, credential persistence and login status
//! - [`config`] - TOML config file and command-line overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod download;
pub mod export;
pub mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{ApiError, ExportApi, YuqueClient};
pub use auth::{CredentialStore, LoginStatus, SessionSnapshot};
pub use catalog::{CatalogError, CatalogNode, NodeKind, Repository, Selection};
pub use config::{ConfigError, Overrides, Settings};
pub use download::{DownloadError, HttpClient, RetryPolicy};
pub use export::{
    ExportError, ExportFormat, ExportOptions, ExportOrchestrator, ExportOutcome, ExportTally,
    JobSettings,
};
