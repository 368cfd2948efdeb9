//! Configuration: optional TOML file plus command-line overrides.
//!
//! The file lives at `$XDG_CONFIG_HOME/yuque-exporter/config.toml`, falling
//! back to `$HOME/.config/yuque-exporter/config.toml`. A missing file means
//! defaults. Every key is optional; command-line values win over file values.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::api::DEFAULT_BASE_URL;
use crate::auth::{CredentialError, CredentialStore};
use crate::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, HttpTimeouts, READ_TIMEOUT_SECS};
use crate::export::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL, ExportFormat, JobSettings};

const APP_DIR: &str = "yuque-exporter";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Output directory used when neither the file nor the command line sets one.
pub const DEFAULT_OUTPUT_DIR: &str = "./yuque_export";

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but cannot be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for the known keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {range}")]
    OutOfRange {
        /// Offending key.
        field: &'static str,
        /// Offending value.
        value: u64,
        /// Allowed range, for the message.
        range: &'static str,
    },

    /// `base_url` is not an absolute http(s) URL.
    #[error("invalid config value for `base_url`: '{0}' is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    /// The default credential location cannot be derived.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Values read from the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Root directory exports are written below.
    pub output_dir: Option<PathBuf>,
    /// Default export format.
    pub format: Option<ExportFormat>,
    /// Service origin.
    pub base_url: Option<String>,
    /// Polls before a pending export is given up (1..=1000).
    pub max_poll_attempts: Option<u32>,
    /// Wait between polls in milliseconds (100..=60000).
    pub poll_interval_ms: Option<u64>,
    /// Attempts per artifact download (1..=10).
    pub download_max_retries: Option<u32>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Saved session cookies, instead of `~/.yuque/cookies.json`.
    pub cookies_file: Option<PathBuf>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] (attributed to `path`) for syntax
    /// errors, unknown keys or wrongly typed values.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and validates the file at `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::from_toml(&text, path)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Checks every present value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::OutOfRange`] or
    /// [`ConfigError::InvalidBaseUrl`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "max_poll_attempts",
            self.max_poll_attempts.map(u64::from),
            1,
            1000,
            "1..=1000",
        )?;
        check_range(
            "poll_interval_ms",
            self.poll_interval_ms,
            100,
            60_000,
            "100..=60000",
        )?;
        check_range(
            "download_max_retries",
            self.download_max_retries.map(u64::from),
            1,
            10,
            "1..=10",
        )?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600, "1..=3600")?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1, 3600, "1..=3600")?;
        if let Some(base_url) = &self.base_url {
            parse_base_url(base_url)?;
        }
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: Option<u64>,
    min: u64,
    max: u64,
    range: &'static str,
) -> Result<(), ConfigError> {
    match value {
        Some(value) if !(min..=max).contains(&value) => Err(ConfigError::OutOfRange {
            field,
            value,
            range,
        }),
        _ => Ok(()),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ConfigError::InvalidBaseUrl(raw.to_string())),
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/yuque-exporter/config.toml`
/// 2. `$HOME/.config/yuque-exporter/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    resolve_config_path(non_empty_env("XDG_CONFIG_HOME"), non_empty_env("HOME"))
}

fn resolve_config_path(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE_NAME));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE_NAME),
    )
}

fn non_empty_env(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--output`.
    pub output_dir: Option<PathBuf>,
    /// `--format`.
    pub format: Option<ExportFormat>,
    /// `--base-url`.
    pub base_url: Option<String>,
    /// `--max-poll-attempts`.
    pub max_poll_attempts: Option<u32>,
    /// `--poll-interval-ms`.
    pub poll_interval_ms: Option<u64>,
    /// `--cookies-file`.
    pub cookies_file: Option<PathBuf>,
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root directory exports are written below.
    pub output_dir: PathBuf,
    /// Export format.
    pub format: ExportFormat,
    /// Service origin.
    pub base_url: Url,
    /// Poll bounds for export jobs.
    pub job: JobSettings,
    /// Attempts per artifact download.
    pub download_max_retries: u32,
    /// HTTP timeouts.
    pub timeouts: HttpTimeouts,
    /// Where session cookies are saved.
    pub cookies_file: PathBuf,
}

impl Settings {
    /// Merges `file` and `overrides` over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is out of range, the base URL
    /// is invalid, or no cookie location can be derived.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let merged = FileConfig {
            output_dir: overrides.output_dir.or(file.output_dir),
            format: overrides.format.or(file.format),
            base_url: overrides.base_url.or(file.base_url),
            max_poll_attempts: overrides.max_poll_attempts.or(file.max_poll_attempts),
            poll_interval_ms: overrides.poll_interval_ms.or(file.poll_interval_ms),
            cookies_file: overrides.cookies_file.or(file.cookies_file),
            ..file
        };
        merged.validate()?;

        let base_url = parse_base_url(merged.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let cookies_file = match merged.cookies_file {
            Some(path) => path,
            None => CredentialStore::at_default_location()?.path().to_path_buf(),
        };

        Ok(Self {
            output_dir: merged
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            format: merged.format.unwrap_or_default(),
            base_url,
            job: JobSettings {
                max_attempts: merged.max_poll_attempts.unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS),
                poll_interval: merged
                    .poll_interval_ms
                    .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
            },
            download_max_retries: merged.download_max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            timeouts: HttpTimeouts {
                connect_secs: merged.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
                read_secs: merged.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            },
            cookies_file,
        })
    }

    /// Credential store at the configured cookie location.
    #[must_use]
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(&self.cookies_file)
    }
}
