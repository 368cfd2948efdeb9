//! `catalog` command: print one knowledge base's catalog as a tree.

use anyhow::{Context, Result};
use exporter_core::catalog::{CatalogIndex, TreeEntry};
use exporter_core::{ExportApi, NodeKind, Settings};

use super::{connect, find_repository};
use crate::ProcessExit;

pub(crate) async fn run_catalog_command(settings: &Settings, key: &str) -> Result<ProcessExit> {
    let api = connect(settings)?;
    let repositories = api.list_repositories().await.context("failed to list knowledge bases")?;
    let repository = find_repository(&repositories, key)?;

    let nodes = api
        .list_catalog_nodes(repository)
        .await
        .with_context(|| format!("failed to fetch catalog of '{}'", repository.name))?;

    println!("{repository}");
    for entry in CatalogIndex::build(&nodes).tree_view() {
        println!("{}", format_entry(&entry));
    }
    Ok(ProcessExit::Success)
}

fn format_entry(entry: &TreeEntry<'_>) -> String {
    let marker = match entry.node.kind {
        NodeKind::Group => "+",
        NodeKind::Document => "-",
    };
    format!(
        "{}{marker} {}  [{}]",
        "  ".repeat(entry.depth + 1),
        entry.node.title,
        entry.node.uuid
    )
}
