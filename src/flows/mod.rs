//! The four instance lifecycle flows.
//!
//! Each flow is a method on [`Orchestrator`], which owns the configuration and
//! the two collaborator backends. Flows are synchronous and return a typed
//! outcome or a [`FlowError`].
mod attach;
mod create;
mod rebuild;
mod remove;

use std::io;

pub use attach::AttachOutcome;
pub use create::{CreateOutcome, CreateRequest};
pub use rebuild::RebuildOutcome;
pub use remove::{ConfirmFn, RemoveOutcome, RemoveRequest};

use crate::backend::{ContainerBackend, RepoBackend};
use crate::config::Config;
use crate::container::DockerCli;
use crate::errors::FlowError;
use crate::git::GitCli;
use crate::naming::WorkspacePath;
use crate::workspace::{find_workspace_by_name, list_instances, InstanceSummary};

/// Progress messages emitted while a container is being started.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&str);

fn report(progress: &mut Option<ProgressFn<'_>>, msg: &str) {
    tracing::info!("{msg}");
    if let Some(p) = progress {
        p(msg);
    }
}

pub struct Orchestrator<C, R> {
    config: Config,
    containers: C,
    repo: R,
}

impl Orchestrator<DockerCli, GitCli> {
    /// Orchestrator backed by the docker, devcontainer and git CLIs.
    pub fn from_config(config: Config) -> Self {
        let containers = DockerCli::from_config(&config);
        let repo = GitCli::from_config(&config);
        Self::new(config, containers, repo)
    }
}

impl<C: ContainerBackend, R: RepoBackend> Orchestrator<C, R> {
    pub fn new(config: Config, containers: C, repo: R) -> Self {
        Self {
            config,
            containers,
            repo,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn containers(&self) -> &C {
        &self.containers
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn find_workspace(&self, query: &str) -> Result<WorkspacePath, FlowError> {
        find_workspace_by_name(&self.config.base_dir, query)
    }

    pub fn list(&self, include_git: bool) -> io::Result<Vec<InstanceSummary>> {
        list_instances(&self.config.base_dir, &self.containers, &self.repo, include_git)
    }

    /// Lookup followed by the runtime availability probe, shared by every
    /// flow that acts on an existing instance.
    fn locate(&self, query: &str) -> Result<WorkspacePath, FlowError> {
        let ws = self.find_workspace(query)?;
        self.containers.check_available()?;
        Ok(ws)
    }
}
