//! Seams between the orchestration flows and external tools.
//!
//! [`crate::container::DockerCli`] and [`crate::git::GitCli`] are the real
//! implementations; tests substitute recording fakes.
use std::fmt;
use std::path::Path;

use crate::container::{ContainerError, ContainerStatus, UpOutcome, UpRequest};
use crate::gitstate::{GitState, GitStateError};

pub trait ContainerBackend {
    /// Short probe gating every other call.
    fn check_available(&self) -> Result<(), ContainerError>;

    fn status(&self, container_name: &str) -> Result<ContainerStatus, ContainerError>;

    /// Build (if needed) and start the workspace's container.
    fn up(&self, req: &UpRequest) -> Result<UpOutcome, ContainerError>;

    /// Actual runtime name for a freshly started container, by id and then
    /// by workspace label. `None` when neither lookup yields a name.
    fn resolve_name(&self, container_id: Option<&str>, workspace_root: &Path) -> Option<String>;

    /// Succeeds when the container is absent or already stopped.
    fn stop(&self, container_name: &str) -> Result<(), ContainerError>;

    /// Succeeds when the container is absent.
    fn remove(&self, container_name: &str) -> Result<(), ContainerError>;

    /// Folder `workspace_root` is mounted at inside the container, read from
    /// the running container. `None` when it cannot be determined.
    fn workspace_folder(&self, container_name: &str, workspace_root: &Path) -> Option<String>;

    /// Attach to (or create) the persistent terminal session in the container.
    /// Without a `workdir` the container's own working directory applies.
    fn attach_session(
        &self,
        container_name: &str,
        workdir: Option<&str>,
        session: &str,
    ) -> Result<(), ContainerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    CloneFailed(String),
    NoRemote(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::CloneFailed(msg) => write!(f, "git clone failed: {msg}"),
            RepoError::NoRemote(msg) => write!(f, "cannot resolve remote URL: {msg}"),
        }
    }
}

impl std::error::Error for RepoError {}

pub trait RepoBackend {
    /// Clone `url` into `dest`, which already exists and is empty.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RepoError>;

    /// `origin` URL of a local checkout.
    fn remote_url(&self, checkout: &Path) -> Result<String, RepoError>;

    fn git_state(&self, root: &Path) -> Result<GitState, GitStateError>;
}
