//! Constants for the download module (timeouts, chunking, retry caps).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large exports).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Largest slice of a network chunk reported in one progress callback.
pub const PROGRESS_CHUNK_BYTES: usize = 64 * 1024;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
