use tracing::instrument;

use super::{report, Orchestrator, ProgressFn};
use crate::backend::{ContainerBackend, RepoBackend};
use crate::container::{ContainerStatus, UpRequest};
use crate::devconfig::{baseline_config_file, config_file_for, detect_repo_config, RepoConfig};
use crate::errors::{ErrorCode, FlowError};
use crate::naming::WorkspacePath;
use crate::state::{now_rfc3339, read_state, write_state_atomic, ConfigSource};

#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub workspace: WorkspacePath,
    pub container_name: String,
    /// The container had to be started first.
    pub started: bool,
}

/// Config source of an instance whose state predates the recorded field.
pub(super) fn infer_config_source(ws: &WorkspacePath) -> Result<ConfigSource, FlowError> {
    if baseline_config_file(ws).is_file() {
        return Ok(ConfigSource::Baseline);
    }
    match detect_repo_config(&ws.root) {
        RepoConfig::Present(_) => Ok(ConfigSource::Repo),
        RepoConfig::Incomplete(dir) => Err(FlowError::new(
            ErrorCode::ConfigIncomplete,
            format!("{} exists but has no devcontainer.json", dir.display()),
        )),
        RepoConfig::Absent => Err(FlowError::new(
            ErrorCode::ConfigSourceUnknown,
            format!("no devcontainer config found for '{}'", ws.name),
        )
        .with_suggestion("Recreate the instance with `devbox remove` and `devbox create`.")),
    }
}

impl<C: ContainerBackend, R: RepoBackend> Orchestrator<C, R> {
    /// Start the instance if needed, then attach to its terminal session.
    /// Blocks for as long as the session stays attached.
    #[instrument(level = "info", err, skip(self, progress))]
    pub fn attach(
        &self,
        query: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<AttachOutcome, FlowError> {
        let ws = self.locate(query)?;
        let mut state = read_state(&ws.state_file).map_err(|e| FlowError::state_read(&e))?;
        if state.is_fallback() {
            tracing::warn!(workspace = %ws.name, "state file unusable; continuing with derived defaults");
        }

        let status = self.containers.status(&state.container_name)?;
        let mut started = false;
        let mut workdir: Option<String> = None;
        if status != ContainerStatus::Running {
            let source = match state.config_source {
                Some(s) => s,
                None => {
                    let s = infer_config_source(&ws)?;
                    tracing::info!(workspace = %ws.name, source = s.as_str(), "inferred config source");
                    s
                }
            };
            report(&mut progress, &format!("Starting container {} ({status})", state.container_name));
            let up = self.containers.up(&UpRequest {
                workspace_root: ws.root.clone(),
                config_file: config_file_for(&ws, source),
                container_name: state.container_name.clone(),
            })?;
            if let Some(name) = self.containers.resolve_name(up.container_id.as_deref(), &ws.root) {
                if name != state.container_name {
                    tracing::info!(old = %state.container_name, new = %name, "container name changed");
                    state.container_name = name;
                }
            }
            workdir = up.remote_workspace_folder.filter(|f| !f.is_empty());
            started = true;
        }

        // Repository configs pick their own workspaceFolder.
        let workdir =
            workdir.or_else(|| self.containers.workspace_folder(&state.container_name, &ws.root));
        if workdir.is_none() {
            tracing::warn!(container = %state.container_name, "workspace mount not found; using the container's working directory");
        }

        report(&mut progress, &format!("Attaching to {}", state.container_name));
        self.containers
            .attach_session(&state.container_name, workdir.as_deref(), &self.config.session_name)?;

        // An unusable state file is left untouched.
        if state.is_fallback() {
            tracing::warn!(workspace = %ws.name, "state file left as is; lastAttached not recorded");
        } else {
            state.last_attached = now_rfc3339();
            write_state_atomic(&ws.state_file, &state).map_err(|e| FlowError::state_write(&e))?;
        }

        Ok(AttachOutcome {
            container_name: state.container_name,
            workspace: ws,
            started,
        })
    }
}
