//! Streaming download pipeline for finished export artifacts.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Progress callbacks per bounded chunk
//! - Content-Length and non-empty verification; failed transfers leave no file
//! - Transparent retry of transient failures with exponential backoff
//!
//! # Example
//!
//! ```no_run
//! use exporter_core::download::{HttpClient, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::without_session(RetryPolicy::default())?;
//! let bytes = client
//!     .download("https://cdn.example.com/export/intro.md", Path::new("./out/Intro.md"), |_, _| {})
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod retry;

pub use client::{HttpClient, HttpTimeouts, build_client};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
pub(crate) use retry::{classify_http_status, is_tls_error};
