//! Workspace lookup and instance enumeration.
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::backend::{ContainerBackend, RepoBackend};
use crate::container::ContainerStatus;
use crate::errors::{ErrorCode, FlowError};
use crate::gitstate::GitState;
use crate::naming::{workspaces_dir, WorkspacePath};
use crate::state::{fallback_state, read_state};

/// Names of all workspace directories under the base dir, sorted.
pub fn workspace_names(base_dir: &Path) -> io::Result<Vec<String>> {
    let dir = workspaces_dir(base_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve `query` to a workspace: exact name, else the unique workspace whose
/// name ends with `-<query>`.
pub fn find_workspace_by_name(base_dir: &Path, query: &str) -> Result<WorkspacePath, FlowError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(FlowError::new(ErrorCode::InvalidName, "instance name must not be empty"));
    }
    let names = workspace_names(base_dir).map_err(|e| {
        FlowError::new(
            ErrorCode::WorkspaceNotFound,
            format!("cannot read {}: {e}", workspaces_dir(base_dir).display()),
        )
    })?;

    if names.iter().any(|n| n == query) {
        return Ok(WorkspacePath::new(base_dir, query));
    }

    let suffix = format!("-{query}");
    let candidates: Vec<String> = names.into_iter().filter(|n| n.ends_with(&suffix)).collect();
    match candidates.len() {
        0 => Err(FlowError::new(
            ErrorCode::WorkspaceNotFound,
            format!("no workspace matches '{query}'"),
        )
        .with_suggestion("Run `devbox list` to see existing instances.")),
        1 => Ok(WorkspacePath::new(base_dir, &candidates[0])),
        _ => Err(FlowError::new(
            ErrorCode::AmbiguousMatch,
            format!(
                "'{query}' matches {} workspaces: {}",
                candidates.len(),
                candidates.join(", ")
            ),
        )
        .with_suggestion("Use the full workspace name.")
        .with_candidates(candidates)),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub name: String,
    /// `None` when the runtime could not be queried.
    pub status: Option<ContainerStatus>,
    pub last_attached: String,
    pub purpose: Option<String>,
    pub git_state: Option<GitState>,
}

/// Summaries for every workspace. Per-instance failures degrade to `None`
/// fields instead of failing the listing.
pub fn list_instances<C, R>(
    base_dir: &Path,
    containers: &C,
    repo: &R,
    include_git: bool,
) -> io::Result<Vec<InstanceSummary>>
where
    C: ContainerBackend,
    R: RepoBackend,
{
    let runtime_up = match containers.check_available() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "container runtime unavailable; listing without status");
            false
        }
    };

    let mut out = Vec::new();
    for name in workspace_names(base_dir)? {
        let ws = WorkspacePath::new(base_dir, &name);
        let state = match read_state(&ws.state_file) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(workspace = %name, error = %e, "state unreadable; listing with derived defaults");
                fallback_state(&ws.state_file)
            }
        };
        let status = if runtime_up {
            containers
                .status(&state.container_name)
                .map_err(|e| tracing::warn!(workspace = %name, error = %e, "status query failed"))
                .ok()
        } else {
            None
        };
        let git_state = if include_git {
            repo.git_state(&ws.root)
                .map_err(|e| tracing::warn!(workspace = %name, error = %e, "git state unavailable"))
                .ok()
        } else {
            None
        };
        out.push(InstanceSummary {
            name,
            status,
            last_attached: state.last_attached,
            purpose: state.purpose,
            git_state,
        });
    }
    Ok(out)
}
