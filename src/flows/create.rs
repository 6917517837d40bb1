use std::fs;
use std::io;
use std::path::Path;

use tracing::instrument;

use super::{report, Orchestrator, ProgressFn};
use crate::backend::{ContainerBackend, RepoBackend};
use crate::container::UpRequest;
use crate::devconfig::{config_file_for, materialize_config};
use crate::errors::{ErrorCode, FlowError};
use crate::naming::{derive_repo_slug, derive_workspace_name, workspaces_dir, WorkspacePath};
use crate::state::{create_initial_state, ensure_git_exclude, write_state_atomic, InstanceState, NewInstance};

const URL_SCHEMES: &[&str] = &["https", "http", "ssh", "git", "file"];

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// Repository URL, or a path to a local checkout whose `origin` is used.
    pub repo: String,
    pub instance: String,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub workspace: WorkspacePath,
    pub state: InstanceState,
}

/// `user@host:path`
fn is_scp_like(s: &str) -> bool {
    match (s.find('@'), s.find(':')) {
        (Some(at), Some(colon)) => at > 0 && colon > at + 1 && colon + 1 < s.len() && !s.contains("://"),
        _ => false,
    }
}

fn is_supported_url(s: &str) -> bool {
    if is_scp_like(s) {
        return true;
    }
    match url::Url::parse(s) {
        Ok(u) => URL_SCHEMES.contains(&u.scheme()) && !u.path().trim_matches('/').is_empty(),
        Err(_) => false,
    }
}

impl<C: ContainerBackend, R: RepoBackend> Orchestrator<C, R> {
    /// Accept a clone URL as is; resolve a local checkout path to its remote.
    pub fn resolve_repo_url(&self, repo: &str) -> Result<String, FlowError> {
        let repo = repo.trim();
        if is_supported_url(repo) {
            return Ok(repo.to_string());
        }
        let path = Path::new(repo);
        if !repo.is_empty() && path.is_dir() {
            let url = self.repo.remote_url(path)?;
            tracing::info!(path = %path.display(), url = %url, "resolved local checkout to remote URL");
            return Ok(url);
        }
        Err(FlowError::new(
            ErrorCode::InvalidUrl,
            format!("'{repo}' is neither a supported repository URL nor a local checkout"),
        )
        .with_suggestion("Use an https:// or git@host:owner/repo.git URL."))
    }

    #[instrument(level = "info", err, skip_all, fields(repo = %req.repo, instance = %req.instance))]
    pub fn create(
        &self,
        req: &CreateRequest,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<CreateOutcome, FlowError> {
        let url = self.resolve_repo_url(&req.repo)?;
        let slug = derive_repo_slug(&url)?;
        let name = derive_workspace_name(&slug, &req.instance)?;
        let ws = WorkspacePath::new(&self.config.base_dir, &name);

        self.containers.check_available()?;

        let parent = workspaces_dir(&self.config.base_dir);
        fs::create_dir_all(&parent).map_err(|e| {
            FlowError::new(
                ErrorCode::StateWriteFailed,
                format!("cannot create {}: {e}", parent.display()),
            )
        })?;
        // Exclusive creation is the only guard against a concurrent create.
        match fs::create_dir(&ws.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FlowError::new(
                    ErrorCode::WorkspaceExists,
                    format!("workspace '{name}' already exists at {}", ws.root.display()),
                )
                .with_suggestion(format!(
                    "Attach with `devbox attach {name}` or pick another instance name."
                )));
            }
            Err(e) => {
                return Err(FlowError::new(
                    ErrorCode::StateWriteFailed,
                    format!("cannot create {}: {e}", ws.root.display()),
                ))
            }
        }

        let mut started: Option<String> = None;
        let new = NewInstance {
            instance: req.instance.clone(),
            repo_slug: slug,
            repo_url: url,
            workspace_name: name,
            purpose: req.purpose.clone().filter(|p| !p.trim().is_empty()),
            container_name: None,
            config_source: None,
        };
        match self.build_workspace(&ws, new, &mut started, &mut progress) {
            Ok(state) => Ok(CreateOutcome { workspace: ws, state }),
            Err(e) => {
                self.rollback_create(&ws, started.as_deref());
                Err(e)
            }
        }
    }

    /// Everything after the workspace directory exists. `started` is set once
    /// a container has been brought up so rollback can remove it.
    fn build_workspace(
        &self,
        ws: &WorkspacePath,
        mut new: NewInstance,
        started: &mut Option<String>,
        progress: &mut Option<ProgressFn<'_>>,
    ) -> Result<InstanceState, FlowError> {
        report(progress, &format!("Cloning {}", new.repo_url));
        self.repo.clone_repo(&new.repo_url, &ws.root)?;

        ensure_git_exclude(&ws.root).map_err(|e| FlowError::state_write(&e))?;

        let default_name = ws.default_container_name();
        let source = materialize_config(ws, self.config.baseline_dir.as_deref(), &default_name)
            .map_err(FlowError::config_setup)?;

        report(progress, &format!("Starting container ({} config)", source.as_str()));
        let up = self.containers.up(&UpRequest {
            workspace_root: ws.root.clone(),
            config_file: config_file_for(ws, source),
            container_name: default_name.clone(),
        })?;
        *started = Some(default_name.clone());

        let actual = self
            .containers
            .resolve_name(up.container_id.as_deref(), &ws.root)
            .unwrap_or(default_name);
        *started = Some(actual.clone());

        new.container_name = Some(actual);
        new.config_source = Some(source);
        let state = create_initial_state(&new);
        write_state_atomic(&ws.state_file, &state).map_err(|e| FlowError::state_write(&e))?;
        tracing::info!(workspace = %ws.name, container = %state.container_name, "instance created");
        Ok(state)
    }

    fn rollback_create(&self, ws: &WorkspacePath, started: Option<&str>) {
        if let Some(name) = started {
            if let Err(e) = self.containers.stop(name) {
                tracing::warn!(container = name, error = %e, "rollback: failed to stop container");
            }
            if let Err(e) = self.containers.remove(name) {
                tracing::warn!(container = name, error = %e, "rollback: failed to remove container");
            }
        }
        match fs::remove_dir_all(&ws.root) {
            Ok(()) => tracing::info!(path = %ws.root.display(), "rollback: removed partial workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %ws.root.display(), error = %e, "rollback: failed to remove partial workspace")
            }
        }
    }
}
