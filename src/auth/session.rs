//! Immutable session snapshot and login-status classification.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, info, instrument};
use url::Url;

use super::{CredentialError, CredentialStore, SessionCookie, load_cookies_into_jar};
use crate::api::{ApiError, ExportApi, api_headers};
use crate::download::{HttpTimeouts, build_client};
use crate::user_agent::effective_user_agent;

/// Credentials captured once at the start of a run.
///
/// Every request of the run uses this snapshot; it is never refreshed
/// behind the caller's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    cookies: Vec<SessionCookie>,
    user_agent: String,
}

impl SessionSnapshot {
    /// Snapshot of `cookies`, dropping those already expired.
    #[must_use]
    pub fn new(cookies: Vec<SessionCookie>, user_agent: Option<&str>) -> Self {
        let now = unix_now();
        let before = cookies.len();
        let cookies: Vec<SessionCookie> = cookies
            .into_iter()
            .filter(|cookie| !cookie.is_expired_at(now))
            .collect();
        if cookies.len() < before {
            debug!(dropped = before - cookies.len(), "ignoring expired cookies");
        }
        Self {
            cookies,
            user_agent: effective_user_agent(user_agent),
        }
    }

    /// Snapshot of whatever `store` holds; empty when nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the stored file cannot be read or parsed.
    pub fn from_store(store: &CredentialStore) -> Result<Self, CredentialError> {
        Ok(match store.load()? {
            Some(stored) => Self::new(stored.cookies, stored.user_agent.as_deref()),
            None => Self::new(Vec::new(), None),
        })
    }

    /// The session cookies.
    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// User agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns true when there are no usable cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Cookie jar holding the snapshot's cookies.
    #[must_use]
    pub fn cookie_jar(&self) -> Arc<Jar> {
        load_cookies_into_jar(&self.cookies)
    }

    /// reqwest client for API and download traffic against `base`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn http_client(&self, base: &Url, timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
        build_client(
            Some(self.cookie_jar()),
            &self.user_agent,
            timeouts,
            api_headers(base),
        )
    }
}

/// Whether the saved session can still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// Cookies are present and the service accepts them.
    LoggedIn,
    /// Cookies are present but the service rejects them.
    Expired,
    /// No cookies are saved.
    None,
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoggedIn => "logged in",
            Self::Expired => "expired",
            Self::None => "not logged in",
        })
    }
}

/// Classifies `snapshot` by probing an authenticated endpoint through `api`.
///
/// `api` must have been built from `snapshot`. An empty snapshot is `None`
/// without any request; a 401/403 or a redirect to the login page is
/// `Expired`.
///
/// # Errors
///
/// Returns the [`ApiError`] when the probe fails for any other reason, since
/// the status cannot be decided then.
#[instrument(skip(snapshot, api), fields(cookies = snapshot.cookies().len()))]
pub async fn check_login_status(
    snapshot: &SessionSnapshot,
    api: &dyn ExportApi,
) -> Result<LoginStatus, ApiError> {
    if snapshot.is_empty() {
        return Ok(LoginStatus::None);
    }
    let status = match api.list_repositories().await {
        Ok(_) => LoginStatus::LoggedIn,
        Err(error) if error.is_unauthorized() => LoginStatus::Expired,
        Err(error) => return Err(error),
    };
    info!(status = %status, "login status checked");
    Ok(status)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
