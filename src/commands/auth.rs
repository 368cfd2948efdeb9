//! Auth command handlers: import, inspect and clear the saved session.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use exporter_core::auth::{check_login_status, parse_netscape_cookies};
use exporter_core::{LoginStatus, SessionSnapshot, Settings};
use tracing::{info, warn};

use super::api_client;
use crate::ProcessExit;

pub(crate) async fn run_auth_status_command(settings: &Settings) -> Result<ProcessExit> {
    let store = settings.credential_store();
    let snapshot = SessionSnapshot::from_store(&store)
        .with_context(|| format!("failed to read saved session {}", store.path().display()))?;

    let status = if snapshot.is_empty() {
        LoginStatus::None
    } else {
        let http = snapshot
            .http_client(&settings.base_url, settings.timeouts)
            .context("failed to build HTTP client")?;
        let api = api_client(http, settings);
        check_login_status(&snapshot, &api)
            .await
            .context("could not determine login status")?
    };

    println!("{status}");
    if status == LoginStatus::LoggedIn {
        Ok(ProcessExit::Success)
    } else {
        info!("Import fresh browser cookies with `yuque-exporter auth import <cookies.txt>`");
        Ok(ProcessExit::Failure)
    }
}

pub(crate) fn run_auth_import_command(
    settings: &Settings,
    file: &Path,
    user_agent: Option<&str>,
) -> Result<ProcessExit> {
    let raw = read_cookie_input(file)?;
    let parsed = parse_netscape_cookies(raw.as_bytes())
        .map_err(|error| anyhow!("cookie import failed: {error}"))?;
    if parsed.cookies.is_empty() {
        return Err(anyhow!("cookie import failed: no cookies in {}", file.display()));
    }
    for (line, reason) in &parsed.warnings {
        warn!(line, "{reason}");
    }

    let store = settings.credential_store();
    store
        .save(&parsed.cookies, user_agent)
        .with_context(|| format!("failed to save session to {}", store.path().display()))?;
    info!(
        cookies = parsed.cookies.len(),
        skipped = parsed.warnings.len(),
        path = %store.path().display(),
        "Saved session cookies"
    );
    println!(
        "Saved {} cookies to {}",
        parsed.cookies.len(),
        store.path().display()
    );
    Ok(ProcessExit::Success)
}

pub(crate) fn run_auth_clear_command(settings: &Settings) -> Result<ProcessExit> {
    let store = settings.credential_store();
    let removed = store
        .clear()
        .map_err(|error| anyhow!("failed to clear saved session: {error}"))?;
    if removed {
        info!(path = %store.path().display(), "Cleared saved session");
    } else {
        info!("No saved session found");
    }
    Ok(ProcessExit::Success)
}

fn read_cookie_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read cookies from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(file)
        .with_context(|| format!("cannot read cookie file {}", file.display()))
}
