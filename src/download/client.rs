//! HTTP client wrapper for streaming export artifacts to disk.
//!
//! [`HttpClient::download`] wraps a single streaming transfer in the
//! [`RetryPolicy`] loop: transient failures (timeouts, 408/429/5xx, truncated
//! bodies) are retried with backoff, everything else surfaces immediately.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PROGRESS_CHUNK_BYTES, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, classify_error, parse_retry_after};
use crate::user_agent::BROWSER_USER_AGENT;

/// Connect and read timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Builds the reqwest client shared by API and download traffic.
///
/// One client means one connection pool and one cookie jar for the whole
/// run; the jar is read-only after construction.
///
/// # Errors
///
/// Returns the reqwest builder error if the TLS backend cannot be initialized.
pub fn build_client(
    cookie_jar: Option<Arc<Jar>>,
    user_agent: &str,
    timeouts: HttpTimeouts,
    default_headers: HeaderMap,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(user_agent)
        .default_headers(default_headers);
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder.build()
}

/// HTTP client for downloading export artifacts with streaming support.
///
/// Created once per run and reused for every document so connections are
/// pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl HttpClient {
    /// Wraps an already configured reqwest client.
    #[must_use]
    pub fn new(client: Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    /// Creates a client without session cookies, using default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn without_session(retry_policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = build_client(
            None,
            BROWSER_USER_AGENT,
            HttpTimeouts::default(),
            HeaderMap::new(),
        )?;
        Ok(Self::new(client, retry_policy))
    }

    /// Returns the retry policy applied to each transfer.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// `on_progress(0, Some(total))` is invoked before streaming whenever the
    /// server announces a length (again on every retry, so displays can
    /// reset); `on_progress(n, None)` is invoked per written chunk of at most
    /// 64 KiB. The body is staged in a sibling `.part` file and renamed onto
    /// `dest` only once complete, so a failed or empty transfer leaves any
    /// earlier file at `dest` untouched.
    ///
    /// # Errors
    ///
    /// Returns the last [`DownloadError`] once retries are exhausted or the
    /// failure is not retryable.
    #[instrument(skip(self, on_progress), fields(url = %url, path = %dest.display()))]
    pub async fn download<F>(
        &self,
        url: &str,
        dest: &Path,
        mut on_progress: F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(u64, Option<u64>),
    {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut attempt: u32 = 1;
        loop {
            let error = match self.download_once(url, dest, &mut on_progress).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = retry_after_delay(&error).unwrap_or(delay);
                    warn!(
                        attempt,
                        next_attempt = next,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "transfer failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, "giving up on transfer");
                    return Err(error);
                }
            }
        }
    }

    async fn download_once<F>(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &mut F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Err(DownloadError::auth_required(url, status));
        }
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status,
                retry_after,
            ));
        }

        let total = response.content_length();
        if let Some(total) = total {
            on_progress(0, Some(total));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let part = part_path(dest);
        let mut file = File::create(&part)
            .await
            .map_err(|e| DownloadError::io(&part, e))?;

        let outcome = stream_to_file(&mut file, response, url, &part, on_progress).await;
        drop(file);

        let written = match outcome {
            Ok(written) => written,
            Err(error) => {
                debug!(path = %part.display(), "cleaning up partial file after error");
                remove_quietly(&part).await;
                return Err(error);
            }
        };

        if let Some(expected) = total
            && expected != written
        {
            remove_quietly(&part).await;
            return Err(DownloadError::integrity(dest, expected, written));
        }

        let on_disk = match tokio::fs::metadata(&part).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                remove_quietly(&part).await;
                return Err(DownloadError::io(&part, e));
            }
        };
        if on_disk == 0 {
            remove_quietly(&part).await;
            return Err(DownloadError::empty_file(url, dest));
        }

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            remove_quietly(&part).await;
            return Err(DownloadError::io(dest, e));
        }

        info!(path = %dest.display(), bytes = on_disk, "download complete");
        Ok(on_disk)
    }
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file<F>(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    on_progress: &mut F,
) -> Result<u64, DownloadError>
where
    F: FnMut(u64, Option<u64>),
{
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        for piece in chunk.chunks(PROGRESS_CHUNK_BYTES) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            let len = piece.len() as u64;
            bytes_written += len;
            on_progress(len, None);
        }
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;

    Ok(bytes_written)
}

/// Server-requested delay for a rate-limited response, if it sent one.
fn retry_after_delay(error: &DownloadError) -> Option<Duration> {
    match error {
        DownloadError::HttpStatus {
            status: 429,
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Staging path next to `dest`: `Intro.md` becomes `Intro.md.part`.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn remove_quietly(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "failed to remove partial file");
    }
}
