//! Error types for calls to the knowledge-base service API.

use thiserror::Error;

use crate::download::{FailureType, classify_http_status, is_tls_error};

/// Transport-level failures reaching the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error calling {url}: {source}")]
    Network {
        /// The endpoint that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout calling {url}")]
    Timeout {
        /// The endpoint that timed out.
        url: String,
    },

    /// Non-success HTTP status outside the recognized export signals.
    #[error("HTTP {status} calling {url}: {body_excerpt}")]
    HttpStatus {
        /// The endpoint that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Leading part of the response body, for diagnostics.
        body_excerpt: String,
    },

    /// The session is not (or no longer) authorized.
    #[error(
        "[AUTH] session rejected by {url} (HTTP {status})\n  Suggestion: run `yuque-exporter auth import <cookies.txt>` with fresh browser cookies"
    )]
    Unauthorized {
        /// The endpoint that rejected the session.
        url: String,
        /// 401/403, or 0 when the service redirected to a login page.
        status: u16,
    },

    /// The response body was not the JSON shape the endpoint promises.
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// The endpoint whose payload could not be decoded.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// A URL could not be built or resolved.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Maximum number of body characters kept in error messages.
const BODY_EXCERPT_CHARS: usize = 100;

impl ApiError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error, keeping a short excerpt of the body.
    pub fn http_status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body_excerpt: body.chars().take(BODY_EXCERPT_CHARS).collect(),
        }
    }

    /// Creates an unauthorized-session error.
    pub fn unauthorized(url: impl Into<String>, status: u16) -> Self {
        Self::Unauthorized {
            url: url.into(),
            status,
        }
    }

    /// Creates a payload decoding error.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Classifies the error for the shared retry policy.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Network { source, .. } if is_tls_error(source) => FailureType::Permanent,
            Self::Network { .. } | Self::Timeout { .. } => FailureType::Transient,
            Self::HttpStatus { status, .. } => classify_http_status(*status),
            Self::Unauthorized { .. } => FailureType::NeedsAuth,
            Self::Decode { .. } | Self::InvalidUrl { .. } | Self::ClientBuild(_) => {
                FailureType::Permanent
            }
        }
    }

    /// Returns true when the service rejected the session credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
