use tracing::instrument;

use super::{report, Orchestrator, ProgressFn};
use crate::backend::{ContainerBackend, RepoBackend};
use crate::container::{ContainerError, ContainerStatus, UpRequest};
use crate::devconfig::{config_file_for, refresh_baseline, verify_repo_config};
use crate::errors::{ErrorCode, FlowError};
use crate::naming::WorkspacePath;
use crate::state::{now_rfc3339, read_state, write_state_atomic, ConfigSource, InstanceState};

#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub workspace: WorkspacePath,
    pub state: InstanceState,
    pub was_running: bool,
}

impl<C: ContainerBackend, R: RepoBackend> Orchestrator<C, R> {
    /// Recreate the instance's container from a refreshed config.
    ///
    /// The config is refreshed before anything is torn down; a refresh failure
    /// leaves the existing container untouched. A running container is only
    /// replaced with `force`.
    #[instrument(level = "info", err, skip(self, progress))]
    pub fn rebuild(
        &self,
        query: &str,
        force: bool,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<RebuildOutcome, FlowError> {
        let ws = self.locate(query)?;
        let mut state = read_state(&ws.state_file).map_err(|e| FlowError::state_read(&e))?;

        let source = state.config_source.ok_or_else(|| {
            FlowError::new(
                ErrorCode::ConfigSourceUnknown,
                format!("'{}' has no recorded config source; cannot tell which config to rebuild from", ws.name),
            )
            .with_suggestion("Recreate the instance with `devbox remove` and `devbox create`.")
        })?;

        report(&mut progress, &format!("Refreshing {} config", source.as_str()));
        match source {
            ConfigSource::Baseline => refresh_baseline(
                &ws,
                self.config.baseline_dir.as_deref(),
                &ws.default_container_name(),
            )?,
            ConfigSource::Repo => verify_repo_config(&ws.root)?,
        }

        let status = self.containers.status(&state.container_name)?;
        let was_running = status == ContainerStatus::Running;
        if was_running && !force {
            return Err(FlowError::new(
                ErrorCode::ContainerRunning,
                format!("container {} is currently running", state.container_name),
            )
            .with_suggestion(format!("Pass --force to stop and rebuild '{}'.", ws.name))
            .with_was_running(true));
        }
        if was_running {
            tracing::warn!(container = %state.container_name, "forced rebuild of a running container");
        }

        // From here on the old container may already be gone.
        let teardown = |e: ContainerError| FlowError::from(e).with_was_running(was_running);
        if status != ContainerStatus::NotFound {
            report(&mut progress, &format!("Removing container {}", state.container_name));
            self.containers.stop(&state.container_name).map_err(teardown)?;
            self.containers.remove(&state.container_name).map_err(teardown)?;
        }

        report(&mut progress, "Starting container");
        let default_name = ws.default_container_name();
        let up = self
            .containers
            .up(&UpRequest {
                workspace_root: ws.root.clone(),
                config_file: config_file_for(&ws, source),
                container_name: default_name.clone(),
            })
            .map_err(teardown)?;

        state.container_name = self
            .containers
            .resolve_name(up.container_id.as_deref(), &ws.root)
            .unwrap_or(default_name);
        state.last_rebuilt = Some(now_rfc3339());
        write_state_atomic(&ws.state_file, &state)
            .map_err(|e| FlowError::state_write(&e).with_was_running(was_running))?;

        tracing::info!(workspace = %ws.name, container = %state.container_name, "instance rebuilt");
        Ok(RebuildOutcome {
            workspace: ws,
            state,
            was_running,
        })
    }
}
