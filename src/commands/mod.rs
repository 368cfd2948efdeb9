//! CLI command handlers.

mod auth;
mod catalog;
mod export;
mod repos;

use anyhow::{Context, Result, bail};
use exporter_core::{Repository, RetryPolicy, SessionSnapshot, Settings, YuqueClient};
use tracing::debug;

pub(crate) use auth::{run_auth_clear_command, run_auth_import_command, run_auth_status_command};
pub(crate) use catalog::run_catalog_command;
pub(crate) use export::run_export_command;
pub(crate) use repos::run_repos_command;

const LOGIN_HINT: &str = "run `yuque-exporter auth import <cookies.txt>` with cookies exported from a signed-in browser";

/// Opens the saved session as an API client, failing early when there is none.
pub(crate) fn connect(settings: &Settings) -> Result<YuqueClient> {
    let store = settings.credential_store();
    let snapshot = SessionSnapshot::from_store(&store)
        .with_context(|| format!("failed to read saved session {}", store.path().display()))?;
    if snapshot.is_empty() {
        bail!("no saved session at {}; {LOGIN_HINT}", store.path().display());
    }
    debug!(cookies = snapshot.cookies().len(), "session loaded");
    let http = snapshot
        .http_client(&settings.base_url, settings.timeouts)
        .context("failed to build HTTP client")?;
    Ok(api_client(http, settings))
}

/// API client over `http`, retrying reads as often as downloads.
pub(crate) fn api_client(http: reqwest::Client, settings: &Settings) -> YuqueClient {
    YuqueClient::new(http, settings.base_url.clone())
        .with_retry_policy(RetryPolicy::with_max_attempts(settings.download_max_retries))
}

/// Finds the knowledge base `key` names by id, slug or display name.
pub(crate) fn find_repository<'a>(
    repositories: &'a [Repository],
    key: &str,
) -> Result<&'a Repository> {
    match repositories.iter().find(|repo| repo.matches_key(key)) {
        Some(repo) => Ok(repo),
        None => bail!(
            "no knowledge base matches '{key}' ({} visible; run `yuque-exporter repos` to list them)",
            repositories.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: u64, name: &str, slug: &str) -> Repository {
        Repository {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            owner_login: "team".to_string(),
            description: String::new(),
            doc_count: 0,
            public: false,
        }
    }

    #[test]
    fn test_find_repository_by_id_slug_or_name() {
        let repos = vec![repo(1, "Handbook", "hb"), repo(2, "Notes", "notes")];
        assert_eq!(find_repository(&repos, "2").unwrap().id, 2);
        assert_eq!(find_repository(&repos, "hb").unwrap().id, 1);
        assert_eq!(find_repository(&repos, "Notes").unwrap().id, 2);
    }

    #[test]
    fn test_find_repository_unknown_key_is_error() {
        let repos = vec![repo(1, "Handbook", "hb")];
        let error = find_repository(&repos, "missing").unwrap_err();
        assert!(error.to_string().contains("'missing'"));
    }
}
