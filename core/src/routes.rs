//! Navigation table and its reconciliation with the assistant directory.

use crate::backend::{DirectoryBackend, TransportError};
use crate::message::AssistantDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub path: String,
    pub label: String,
    #[serde(default)]
    pub title: String,
}

impl RouteEntry {
    pub fn new(path: impl Into<String>, label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            title: title.into(),
        }
    }

    fn for_assistant(descriptor: &AssistantDescriptor) -> Self {
        Self::new(
            descriptor.route_path(),
            descriptor.display_name.clone(),
            descriptor.display_name.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub label: String,
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteNode {
    Entry(RouteEntry),
    Group(RouteGroup),
}

impl RouteNode {
    pub fn label(&self) -> &str {
        match self {
            Self::Entry(entry) => &entry.label,
            Self::Group(group) => &group.label,
        }
    }

    /// Entries reachable from this node, in display order.
    pub fn entries(&self) -> &[RouteEntry] {
        match self {
            Self::Entry(entry) => std::slice::from_ref(entry),
            Self::Group(group) => &group.routes,
        }
    }
}

impl From<RouteEntry> for RouteNode {
    fn from(entry: RouteEntry) -> Self {
        Self::Entry(entry)
    }
}

impl From<RouteGroup> for RouteNode {
    fn from(group: RouteGroup) -> Self {
        Self::Group(group)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("failed to fetch the assistant directory: {0}")]
pub struct DirectoryError(#[from] pub TransportError);

/// Every entry of the table, groups expanded in place.
pub fn flatten(table: &[RouteNode]) -> impl Iterator<Item = &RouteEntry> {
    table.iter().flat_map(RouteNode::entries)
}

// Router paths are matched with or without a leading slash.
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Append one flat entry per assistant whose `assistants/{name}` path is not
/// yet present anywhere in `table`. The input is left untouched.
pub fn reconcile(table: &[RouteNode], assistants: &[AssistantDescriptor]) -> Vec<RouteNode> {
    let mut known: HashSet<String> = flatten(table)
        .map(|entry| normalize(&entry.path).to_owned())
        .collect();
    let mut reconciled = table.to_vec();
    for descriptor in assistants {
        let path = descriptor.route_path();
        if known.insert(normalize(&path).to_owned()) {
            reconciled.push(RouteEntry::for_assistant(descriptor).into());
        }
    }
    reconciled
}

/// Fetch the directory and merge it into `table`.
///
/// On failure the caller keeps its table; nothing is merged.
pub async fn refresh_routes<D>(
    directory: &D,
    table: &[RouteNode],
) -> Result<Vec<RouteNode>, DirectoryError>
where
    D: DirectoryBackend + ?Sized,
{
    let assistants = directory.list_assistants().await.map_err(|err| {
        warn!(error = %err, "assistant directory unavailable");
        DirectoryError(err)
    })?;
    let reconciled = reconcile(table, &assistants);
    info!(
        assistants = assistants.len(),
        added = reconciled.len() - table.len(),
        "reconciled navigation routes"
    );
    Ok(reconciled)
}
