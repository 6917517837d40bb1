//! Container lifecycle over an external runtime and a devcontainer-style
//! build tool, normalized to three states and idempotent stop/remove.

pub mod devcontainer;
pub mod runtime;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub use devcontainer::{interpret_up_output, parse_up_result, UpResult};
pub use runtime::{container_runtime_path, mount_destination, normalize_status, DockerCli};

/// Normalized runtime state. Every native state other than running is `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    Running,
    Stopped,
    NotFound,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::NotFound => "not-found",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The runtime binary is missing or its daemon does not answer.
    RuntimeUnavailable(String),
    /// A runtime or build-tool call failed; `message` keeps the tool's own text.
    CommandFailed {
        operation: &'static str,
        message: String,
        suggestion: Option<String>,
    },
}

impl ContainerError {
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        ContainerError::CommandFailed {
            operation,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ContainerError::RuntimeUnavailable(_) => None,
            ContainerError::CommandFailed { suggestion, .. } => suggestion.as_deref(),
        }
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RuntimeUnavailable(msg) => f.write_str(msg),
            ContainerError::CommandFailed {
                operation, message, ..
            } => write!(f, "container {operation} failed: {message}"),
        }
    }
}

impl std::error::Error for ContainerError {}

/// Inputs for bringing a workspace's container up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpRequest {
    pub workspace_root: PathBuf,
    /// Explicit config file; `None` lets the tool find the repository's own.
    pub config_file: Option<PathBuf>,
    /// Name the container is expected to get, used in conflict hints.
    pub container_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpOutcome {
    pub container_id: Option<String>,
    pub remote_workspace_folder: Option<String>,
}
