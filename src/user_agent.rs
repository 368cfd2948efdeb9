//! Shared User-Agent strings for API and download traffic.
//!
//! The service serves its web API to browser sessions, and the session
//! cookies are normally captured from a browser, so requests present a
//! browser User-Agent unless the stored session recorded its own.

/// Browser User-Agent used when no session-specific value is known.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the User-Agent to send: the session's own value when present,
/// otherwise [`BROWSER_USER_AGENT`].
#[must_use]
pub fn effective_user_agent(session_user_agent: Option<&str>) -> String {
    session_user_agent
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(BROWSER_USER_AGENT)
        .to_string()
}
