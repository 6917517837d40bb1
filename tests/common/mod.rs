#![allow(dead_code)]
//! Recording fakes for the container and repository backends.
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use devbox::{
    Config, ContainerBackend, ContainerError, ContainerStatus, GitState, GitStateError,
    Orchestrator, RepoBackend, RepoError, UpOutcome, UpRequest,
};

#[derive(Default)]
pub struct FakeContainers {
    pub unavailable: bool,
    pub statuses: RefCell<HashMap<String, ContainerStatus>>,
    /// Error text returned by `up`; `None` succeeds.
    pub up_error: RefCell<Option<String>>,
    /// Name reported by `resolve_name`; `None` means discovery found nothing.
    pub resolved_name: RefCell<Option<String>>,
    /// Error text returned by `stop`; `None` succeeds.
    pub stop_error: RefCell<Option<String>>,
    /// Where `up` mounts the workspace; `None` mounts it at
    /// `/workspaces/<folder name>` like the devcontainer CLI default.
    pub workspace_folder: RefCell<Option<String>>,
    /// Container name to in-container workspace folder, set by `up`.
    pub mounts: RefCell<HashMap<String, String>>,
    pub calls: RefCell<Vec<String>>,
    pub up_requests: RefCell<Vec<UpRequest>>,
}

impl FakeContainers {
    pub fn set_status(&self, name: &str, status: ContainerStatus) {
        self.statuses.borrow_mut().insert(name.to_string(), status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls whose operation (text before the first space) is `op`.
    pub fn count(&self, op: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerBackend for FakeContainers {
    fn check_available(&self) -> Result<(), ContainerError> {
        self.record("check".to_string());
        if self.unavailable {
            Err(ContainerError::RuntimeUnavailable("docker daemon not running".to_string()))
        } else {
            Ok(())
        }
    }

    fn status(&self, container_name: &str) -> Result<ContainerStatus, ContainerError> {
        self.record(format!("status {container_name}"));
        Ok(self
            .statuses
            .borrow()
            .get(container_name)
            .copied()
            .unwrap_or(ContainerStatus::NotFound))
    }

    fn up(&self, req: &UpRequest) -> Result<UpOutcome, ContainerError> {
        self.record(format!("up {}", req.container_name));
        self.up_requests.borrow_mut().push(req.clone());
        if let Some(msg) = self.up_error.borrow().clone() {
            return Err(ContainerError::failed("start", msg));
        }
        let name = self
            .resolved_name
            .borrow()
            .clone()
            .unwrap_or_else(|| req.container_name.clone());
        self.set_status(&name, ContainerStatus::Running);
        let folder = self.workspace_folder.borrow().clone().unwrap_or_else(|| {
            let dir = req.workspace_root.file_name().unwrap_or_default();
            format!("/workspaces/{}", dir.to_string_lossy())
        });
        self.mounts.borrow_mut().insert(name, folder);
        Ok(UpOutcome {
            container_id: Some("0123456789ab".to_string()),
            remote_workspace_folder: None,
        })
    }

    fn resolve_name(&self, container_id: Option<&str>, _workspace_root: &Path) -> Option<String> {
        self.record(format!("resolve {}", container_id.unwrap_or("-")));
        self.resolved_name.borrow().clone()
    }

    fn stop(&self, container_name: &str) -> Result<(), ContainerError> {
        self.record(format!("stop {container_name}"));
        if let Some(msg) = self.stop_error.borrow().clone() {
            return Err(ContainerError::failed("stop", msg));
        }
        let mut st = self.statuses.borrow_mut();
        if let Some(s) = st.get_mut(container_name) {
            *s = ContainerStatus::Stopped;
        }
        Ok(())
    }

    fn remove(&self, container_name: &str) -> Result<(), ContainerError> {
        self.record(format!("remove {container_name}"));
        self.statuses.borrow_mut().remove(container_name);
        self.mounts.borrow_mut().remove(container_name);
        Ok(())
    }

    fn workspace_folder(&self, container_name: &str, _workspace_root: &Path) -> Option<String> {
        self.record(format!("mounts {container_name}"));
        self.mounts.borrow().get(container_name).cloned()
    }

    fn attach_session(
        &self,
        container_name: &str,
        workdir: Option<&str>,
        session: &str,
    ) -> Result<(), ContainerError> {
        self.record(format!("attach {container_name} {} {session}", workdir.unwrap_or("-")));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRepo {
    /// Files (relative path, content) written into every clone.
    pub clone_files: Vec<(String, String)>,
    pub clone_error: Option<String>,
    pub remotes: HashMap<PathBuf, String>,
    /// `None` reports a clean state.
    pub git_state: RefCell<Option<Result<GitState, GitStateError>>>,
    pub clones: RefCell<Vec<(String, PathBuf)>>,
}

impl FakeRepo {
    pub fn with_state(state: GitState) -> Self {
        let repo = FakeRepo::default();
        *repo.git_state.borrow_mut() = Some(Ok(state));
        repo
    }

    pub fn failing_state(message: &str) -> Self {
        let repo = FakeRepo::default();
        *repo.git_state.borrow_mut() = Some(Err(GitStateError {
            message: message.to_string(),
        }));
        repo
    }
}

impl RepoBackend for FakeRepo {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RepoError> {
        self.clones.borrow_mut().push((url.to_string(), dest.to_path_buf()));
        if let Some(msg) = &self.clone_error {
            return Err(RepoError::CloneFailed(msg.clone()));
        }
        fs::create_dir_all(dest.join(".git").join("info")).map_err(|e| RepoError::CloneFailed(e.to_string()))?;
        fs::write(dest.join(".git").join("info").join("exclude"), "# git ls-files --others --exclude-from=.git/info/exclude\n")
            .map_err(|e| RepoError::CloneFailed(e.to_string()))?;
        for (rel, content) in &self.clone_files {
            let p = dest.join(rel);
            if let Some(parent) = p.parent() {
                fs::create_dir_all(parent).map_err(|e| RepoError::CloneFailed(e.to_string()))?;
            }
            fs::write(&p, content).map_err(|e| RepoError::CloneFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn remote_url(&self, checkout: &Path) -> Result<String, RepoError> {
        self.remotes
            .get(checkout)
            .cloned()
            .ok_or_else(|| RepoError::NoRemote(format!("{} has no origin", checkout.display())))
    }

    fn git_state(&self, _root: &Path) -> Result<GitState, GitStateError> {
        self.git_state.borrow().clone().unwrap_or_else(|| Ok(GitState::default()))
    }
}

pub type TestOrchestrator = Orchestrator<FakeContainers, FakeRepo>;

pub fn orchestrator(base: &Path, containers: FakeContainers, repo: FakeRepo) -> TestOrchestrator {
    Orchestrator::new(Config::with_base_dir(base), containers, repo)
}

pub const REPO_URL: &str = "https://github.com/acme/widgets.git";

/// Create an instance through the create flow with default fakes.
pub fn create_instance(orch: &TestOrchestrator, instance: &str) -> devbox::CreateOutcome {
    let req = devbox::CreateRequest {
        repo: REPO_URL.to_string(),
        instance: instance.to_string(),
        purpose: None,
    };
    orch.create(&req, None).expect("create instance")
}
