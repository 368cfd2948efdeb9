//! Credential persistence.
//!
//! Cookies are stored as JSON at `~/.yuque/cookies.json` (overridable):
//!
//! ```json
//! { "saved_at": "2026-01-01T12:00:00+08:00", "cookies": [ { "name": "...", ... } ] }
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::SessionCookie;

const CREDENTIALS_DIR: &str = ".yuque";
const COOKIE_FILE_NAME: &str = "cookies.json";

/// Errors reading or writing persisted credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No home directory to derive the default location from.
    #[error("unable to determine home directory (set HOME or pass an explicit cookies file)")]
    HomeUnavailable,

    /// Filesystem access failed.
    #[error("credential file {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid credential JSON.
    #[error("credential file {path} is malformed: {source}")]
    Malformed {
        /// File involved.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl CredentialError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk form of a saved cookie set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// When the cookies were saved, ISO 8601. Older files may lack an offset.
    #[serde(default)]
    pub saved_at: String,
    /// The saved cookies.
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    /// User agent of the browser the cookies came from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Load/save/clear of the persisted cookie set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location, `~/.yuque/cookies.json`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::HomeUnavailable`] when `HOME` (or
    /// `USERPROFILE` on Windows) is unset or blank.
    pub fn at_default_location() -> Result<Self, CredentialError> {
        default_path(
            non_blank(env::var_os("HOME")),
            non_blank(env::var_os("USERPROFILE")),
        )
        .map(Self::new)
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved credentials; `Ok(None)` when nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the file exists but cannot be read or
    /// parsed.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("no saved credentials");
                return Ok(None);
            }
            Err(error) => return Err(CredentialError::io(&self.path, error)),
        };
        let stored = serde_json::from_str(&raw).map_err(|source| CredentialError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(stored))
    }

    /// Saves `cookies` (and the browser user agent, if known), stamped with
    /// the current local time.
    ///
    /// The parent directory is created when missing. On Unix the file is
    /// readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if the directory or file cannot be
    /// written.
    #[instrument(level = "debug", skip(self, cookies), fields(path = %self.path.display(), count = cookies.len()))]
    pub fn save(
        &self,
        cookies: &[SessionCookie],
        user_agent: Option<&str>,
    ) -> Result<(), CredentialError> {
        let stored = StoredCredentials {
            saved_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            cookies: cookies.to_vec(),
            user_agent: user_agent.map(str::to_string),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| CredentialError::io(parent, error))?;
        }
        let json = serde_json::to_string_pretty(&stored).map_err(|source| {
            CredentialError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(|error| CredentialError::io(&self.path, error))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    /// Deletes the saved credentials. Returns true when a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(CredentialError::io(&self.path, error)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|error| CredentialError::io(path, error))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CredentialError> {
    Ok(())
}

fn non_blank(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

fn default_path(
    home: Option<PathBuf>,
    user_profile: Option<PathBuf>,
) -> Result<PathBuf, CredentialError> {
    home.or(user_profile)
        .map(|dir| dir.join(CREDENTIALS_DIR).join(COOKIE_FILE_NAME))
        .ok_or(CredentialError::HomeUnavailable)
}
