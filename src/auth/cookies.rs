//! Session cookies: Netscape cookie file import and reqwest jar loading.
//!
//! Browsers (or extensions such as "Get cookies.txt") export the Netscape
//! HTTP cookie format: 7 TAB-separated fields per line. Imported cookies
//! become [`SessionCookie`]s, which are persisted by the credential store
//! and loaded into a `reqwest::cookie::Jar` for API and download traffic.

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

/// One session cookie.
///
/// The value is redacted in `Debug` output so cookies can be traced safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    value: String,
    /// Domain the cookie belongs to (e.g. `.yuque.com`).
    pub domain: String,
    /// URL path scope.
    #[serde(default = "default_path")]
    pub path: String,
    /// Only sent over HTTPS.
    #[serde(default)]
    pub secure: bool,
    /// Unix expiry timestamp; 0 for a session cookie.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expires: u64,
}

fn default_path() -> String {
    "/".to_string()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl SessionCookie {
    /// Creates a host-wide session cookie for `domain`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            secure: false,
            expires: 0,
        }
    }

    /// Returns the cookie value. Never log it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true when the cookie expired before `now_unix`.
    #[must_use]
    pub fn is_expired_at(&self, now_unix: u64) -> bool {
        self.expires != 0 && self.expires <= now_unix
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Errors while importing a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A line does not follow the Netscape format.
    #[error("line {line_number}: {reason} (got: {content})")]
    InvalidLine {
        /// 1-based line number.
        line_number: usize,
        /// The offending line with its value redacted.
        content: String,
        /// What was wrong.
        reason: String,
    },

    /// Reading the file failed.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// The file has data lines but none of them parsed.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines.
        malformed_count: usize,
    },
}

/// Parsed cookies plus the lines that had to be skipped.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed cookies, in file order.
    pub cookies: Vec<SessionCookie>,
    /// `(line number, reason)` for each skipped line.
    pub warnings: Vec<(usize, String)>,
}

/// Parses a Netscape-format cookie file.
///
/// Each data line holds `domain`, `tailmatch`, `path`, `secure`, `expires`,
/// `name` and `value`, separated by TABs. Comment lines (including the
/// `# Netscape HTTP Cookie File` header) and blank lines are skipped.
/// `#HttpOnly_` prefixed lines are data lines for HTTP-only cookies.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure and
/// [`CookieError::NoCookiesFound`] when data lines exist but none parse.
/// Individual malformed lines are reported as warnings.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<ParseResult, CookieError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut data_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let raw = line_result?;
        let trimmed = raw.trim_end();

        let line = match trimmed.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if trimmed.is_empty() || trimmed.starts_with('#') => continue,
            None => trimmed,
        };
        data_lines += 1;

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(line = line_number, domain = %cookie.domain, name = %cookie.name, "parsed cookie");
                cookies.push(cookie);
            }
            Err(error) => {
                warn!(line = line_number, reason = %error, "skipping malformed cookie line");
                warnings.push((line_number, error.to_string()));
            }
        }
    }

    if cookies.is_empty() && data_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParseResult { cookies, warnings })
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<SessionCookie, CookieError> {
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        content: redact_line(line),
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, tailmatch, path, secure, expires, name, value] = fields[..] else {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    };

    parse_flag(tailmatch).ok_or_else(|| {
        invalid(format!("tailmatch field must be TRUE or FALSE, got '{tailmatch}'"))
    })?;
    let secure = parse_flag(secure)
        .ok_or_else(|| invalid(format!("secure field must be TRUE or FALSE, got '{secure}'")))?;
    let expires = expires.parse::<u64>().map_err(|_| {
        invalid(format!(
            "expires field must be a non-negative integer, got '{expires}'"
        ))
    })?;

    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    Ok(SessionCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: domain.to_string(),
        path: if path.is_empty() { default_path() } else { path.to_string() },
        secure,
        expires,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

/// Replaces the value field of a cookie line for error messages.
fn redact_line(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        let mut redacted = fields[..6].join("\t");
        redacted.push_str("\t[REDACTED]");
        redacted
    } else {
        line.to_string()
    }
}

/// Loads `cookies` into a jar for `reqwest::ClientBuilder::cookie_provider`.
///
/// Cookies whose domain cannot form a URL are skipped with a warning.
#[instrument(level = "debug", skip(cookies), fields(count = cookies.len()))]
pub fn load_cookies_into_jar(cookies: &[SessionCookie]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for cookie in cookies {
        match Url::parse(&origin_url(cookie)) {
            Ok(url) => {
                jar.add_cookie_str(&set_cookie_header(cookie), &url);
                debug!(domain = %cookie.domain, name = %cookie.name, "loaded cookie into jar");
            }
            Err(_) => {
                warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with unparseable domain");
            }
        }
    }

    jar
}

fn set_cookie_header(cookie: &SessionCookie) -> String {
    let mut parts = vec![
        format!("{}={}", cookie.name, cookie.value()),
        format!("Domain={}", cookie.domain),
        format!("Path={}", cookie.path),
    ];
    if cookie.secure {
        parts.push("Secure".to_string());
    }
    if cookie.expires > 0 {
        match UNIX_EPOCH.checked_add(Duration::from_secs(cookie.expires)) {
            Some(time) => parts.push(format!("Expires={}", httpdate::fmt_http_date(time))),
            None => warn!(
                name = %cookie.name,
                expires = cookie.expires,
                "cookie expiry overflows SystemTime; treating as session cookie"
            ),
        }
    }
    parts.join("; ")
}

fn origin_url(cookie: &SessionCookie) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    format!("{scheme}://{domain}{}", cookie.path)
}
