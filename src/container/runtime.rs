#![allow(clippy::module_name_repetitions)]
//! Docker runtime discovery and the CLI-backed [`ContainerBackend`].

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use super::{devcontainer, ContainerError, ContainerStatus, UpOutcome, UpRequest};
use crate::backend::ContainerBackend;
use crate::config::{Config, Timeouts};
use crate::util::{ExecOutput, ExecRequest, ExecService};

/// Locate the runtime binary. `DEVBOX_SKIP_DOCKER=1` disables detection.
pub fn container_runtime_path(program: &str) -> io::Result<PathBuf> {
    if env::var("DEVBOX_SKIP_DOCKER").ok().as_deref() == Some("1") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Docker disabled by environment override.",
        ));
    }
    which(program).map_err(|_| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{program} is required but was not found in PATH."),
        )
    })
}

/// Collapse a native runtime state into running/stopped.
pub fn normalize_status(native: &str) -> ContainerStatus {
    if native.trim().eq_ignore_ascii_case("running") {
        ContainerStatus::Running
    } else {
        ContainerStatus::Stopped
    }
}

/// Destination of the mount whose source is `workspace_root`, from the
/// `{{json .Mounts}}` inspect output.
pub fn mount_destination(mounts_json: &str, workspace_root: &Path) -> Option<String> {
    let mounts: Vec<serde_json::Value> = serde_json::from_str(mounts_json.trim()).ok()?;
    let canonical = workspace_root.canonicalize().ok();
    mounts.iter().find_map(|m| {
        let source = Path::new(m.get("Source")?.as_str()?);
        let matches = source == workspace_root || canonical.as_deref() == Some(source);
        if !matches {
            return None;
        }
        m.get("Destination")?
            .as_str()
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    })
}

fn is_not_found(text: &str) -> bool {
    let t = text.to_ascii_lowercase();
    t.contains("no such container") || t.contains("no such object")
}

fn is_not_running(text: &str) -> bool {
    text.to_ascii_lowercase().contains("is not running")
}

fn is_removal_in_progress(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already in progress")
}

/// Drives `docker` for inspect/stop/rm/exec and the devcontainer CLI for `up`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker: String,
    devcontainer: String,
    timeouts: Timeouts,
    exec: ExecService,
}

impl DockerCli {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            docker: cfg.docker.clone(),
            devcontainer: cfg.devcontainer.clone(),
            timeouts: cfg.timeouts,
            exec: ExecService::new(cfg.timeouts.docker),
        }
    }

    fn docker(&self, operation: &'static str, args: &[&str], timeout: Duration) -> Result<ExecOutput, ContainerError> {
        self.exec
            .run(ExecRequest::new(&self.docker).args(args).timeout(timeout))
            .map_err(|e| ContainerError::failed(operation, format!("{e:#}")))
    }
}

impl ContainerBackend for DockerCli {
    fn check_available(&self) -> Result<(), ContainerError> {
        let path = container_runtime_path(&self.docker)
            .map_err(|e| ContainerError::RuntimeUnavailable(e.to_string()))?;
        let out = self
            .exec
            .run(
                ExecRequest::new(&path)
                    .args(["info", "--format", "{{.ServerVersion}}"])
                    .timeout(self.timeouts.probe),
            )
            .map_err(|e| {
                ContainerError::RuntimeUnavailable(format!("container runtime did not respond: {e:#}"))
            })?;
        if !out.success() {
            return Err(ContainerError::RuntimeUnavailable(format!(
                "container runtime is not running: {}",
                out.error_text()
            )));
        }
        tracing::debug!(version = %out.stdout.trim(), "container runtime available");
        Ok(())
    }

    fn status(&self, container_name: &str) -> Result<ContainerStatus, ContainerError> {
        let out = self.docker(
            "inspect",
            &["inspect", "--type", "container", "--format", "{{.State.Status}}", container_name],
            self.timeouts.docker,
        )?;
        if out.success() {
            return Ok(normalize_status(&out.stdout));
        }
        let text = out.error_text();
        if is_not_found(&text) {
            Ok(ContainerStatus::NotFound)
        } else {
            Err(ContainerError::failed("inspect", text))
        }
    }

    fn up(&self, req: &UpRequest) -> Result<UpOutcome, ContainerError> {
        let mut request = ExecRequest::new(&self.devcontainer)
            .arg("up")
            .arg("--workspace-folder")
            .arg(&req.workspace_root);
        if let Some(cfg) = &req.config_file {
            request = request.arg("--config").arg(cfg);
        }
        let out = self
            .exec
            .run(request.timeout(self.timeouts.up))
            .map_err(|e| ContainerError::CommandFailed {
                operation: "start",
                message: format!("{e:#}"),
                suggestion: Some(format!(
                    "Make sure the devcontainer CLI is installed and on PATH (`{}`), e.g. npm install -g @devcontainers/cli",
                    self.devcontainer
                )),
            })?;
        devcontainer::interpret_up_output(&req.container_name, out.success(), &out.stdout, &out.stderr)
    }

    fn resolve_name(&self, container_id: Option<&str>, workspace_root: &Path) -> Option<String> {
        if let Some(id) = container_id.filter(|s| !s.trim().is_empty()) {
            let name = self
                .docker(
                    "inspect",
                    &["inspect", "--type", "container", "--format", "{{.Name}}", id],
                    self.timeouts.docker,
                )
                .ok()
                .filter(|o| o.success())
                .map(|o| o.stdout.trim().trim_start_matches('/').to_string())
                .filter(|s| !s.is_empty());
            if name.is_some() {
                return name;
            }
        }
        let label = format!("label=devcontainer.local_folder={}", workspace_root.display());
        self.docker(
            "list",
            &["ps", "-a", "--filter", &label, "--format", "{{.Names}}"],
            self.timeouts.docker,
        )
        .ok()
        .filter(|o| o.success())
        .and_then(|o| o.stdout.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string))
    }

    fn stop(&self, container_name: &str) -> Result<(), ContainerError> {
        let out = self.docker("stop", &["stop", container_name], self.timeouts.docker)?;
        if out.success() {
            return Ok(());
        }
        let text = out.error_text();
        if is_not_found(&text) || is_not_running(&text) {
            tracing::debug!(container = container_name, "stop: already stopped or absent");
            return Ok(());
        }
        Err(ContainerError::failed("stop", text))
    }

    fn remove(&self, container_name: &str) -> Result<(), ContainerError> {
        let out = self.docker("remove", &["rm", container_name], self.timeouts.docker)?;
        if out.success() {
            return Ok(());
        }
        let text = out.error_text();
        if is_not_found(&text) || is_removal_in_progress(&text) {
            tracing::debug!(container = container_name, "remove: already gone");
            return Ok(());
        }
        Err(ContainerError::failed("remove", text))
    }

    fn workspace_folder(&self, container_name: &str, workspace_root: &Path) -> Option<String> {
        let out = self
            .docker(
                "inspect",
                &["inspect", "--type", "container", "--format", "{{json .Mounts}}", container_name],
                self.timeouts.docker,
            )
            .ok()
            .filter(|o| o.success())?;
        let folder = mount_destination(&out.stdout, workspace_root);
        if folder.is_none() {
            tracing::debug!(container = container_name, root = %workspace_root.display(), "workspace mount not found");
        }
        folder
    }

    fn attach_session(
        &self,
        container_name: &str,
        workdir: Option<&str>,
        session: &str,
    ) -> Result<(), ContainerError> {
        let tty = if atty::is(atty::Stream::Stdin) { "-it" } else { "-i" };
        let mut request = ExecRequest::new(&self.docker).args(["exec", tty]);
        if let Some(dir) = workdir {
            request = request.args(["-w", dir]);
        }
        let out = self
            .exec
            .run(
                request
                    .arg(container_name)
                    .args(["tmux", "new-session", "-A", "-s", session])
                    .interactive(true)
                    .timeout(Duration::ZERO),
            )
            .map_err(|e| ContainerError::failed("attach", format!("{e:#}")))?;
        if out.success() {
            Ok(())
        } else {
            Err(ContainerError::CommandFailed {
                operation: "attach",
                message: format!("terminal session exited with {}", out.status),
                suggestion: Some("Make sure tmux is installed in the container image.".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_states_collapse() {
        assert_eq!(normalize_status("running\n"), ContainerStatus::Running);
        for s in ["exited", "created", "paused", "restarting", "dead", "removing", ""] {
            assert_eq!(normalize_status(s), ContainerStatus::Stopped, "{s}");
        }
    }

    #[test]
    fn test_not_found_signatures() {
        assert!(is_not_found("Error: No such container: devbox-x"));
        assert!(is_not_found("Error response from daemon: No such object: devbox-x"));
        assert!(!is_not_found("permission denied while trying to connect"));
        assert!(is_not_running("Container abc is not running"));
    }

    #[test]
    fn test_mount_destination_matches_workspace_source() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path().join("widgets-dev");
        std::fs::create_dir_all(&root).unwrap();
        let json = serde_json::json!([
            {"Type": "volume", "Source": "/var/lib/docker/volumes/x", "Destination": "/home/vscode/.cache"},
            {"Type": "bind", "Source": root.display().to_string(), "Destination": "/work"},
        ])
        .to_string();
        assert_eq!(mount_destination(&json, &root).as_deref(), Some("/work"));
        assert_eq!(mount_destination(&json, &td.path().join("other")), None);
        assert_eq!(mount_destination("", &root), None);
        assert_eq!(mount_destination("null", &root), None);
    }
}
