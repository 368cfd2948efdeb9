//! `repos` command: list the knowledge bases visible to the session.

use anyhow::{Context, Result};
use exporter_core::{ExportApi, Settings};
use tracing::info;

use super::connect;
use crate::ProcessExit;

pub(crate) async fn run_repos_command(settings: &Settings) -> Result<ProcessExit> {
    let api = connect(settings)?;
    let repositories = api.list_repositories().await.context("failed to list knowledge bases")?;

    if repositories.is_empty() {
        info!("No knowledge bases visible to this session");
        return Ok(ProcessExit::Success);
    }

    let base = settings.base_url.as_str();
    for repo in &repositories {
        println!("{:>10}  {repo}", repo.id);
        println!("{:>10}  {}", "", repo.url(base));
        if !repo.description.is_empty() {
            println!("{:>10}  {}", "", repo.description);
        }
    }
    info!(count = repositories.len(), "knowledge bases listed");
    Ok(ProcessExit::Success)
}
