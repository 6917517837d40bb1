//! Error mapping guide:
//! - Flows return `FlowError`: a machine code, the human message, and an optional suggestion.
//! - Collaborator errors keep the tool's own text in `message`; never paraphrase it away.
//! - Exit codes: 2 for input/identity errors, 3 when the container runtime is unavailable, 1 otherwise.
use std::fmt;
use std::io;

use crate::backend::RepoError;
use crate::container::ContainerError;
use crate::devconfig::ConfigError;
use crate::gitstate::{GitState, GitStateError};
use crate::naming::NameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidName,
    InvalidUrl,
    WorkspaceExists,
    WorkspaceNotFound,
    AmbiguousMatch,
    RuntimeUnavailable,
    CloneFailed,
    ConfigMissing,
    ConfigIncomplete,
    ConfigRefreshFailed,
    ConfigSetupFailed,
    ConfigSourceUnknown,
    ContainerRunning,
    ContainerError,
    SafetyCheckFailed,
    GitStateFailed,
    ConfirmationRequired,
    WorkspaceDeleteFailed,
    StateReadFailed,
    StateWriteFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::WorkspaceExists => "WORKSPACE_EXISTS",
            ErrorCode::WorkspaceNotFound => "WORKSPACE_NOT_FOUND",
            ErrorCode::AmbiguousMatch => "AMBIGUOUS_MATCH",
            ErrorCode::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
            ErrorCode::CloneFailed => "CLONE_FAILED",
            ErrorCode::ConfigMissing => "CONFIG_MISSING",
            ErrorCode::ConfigIncomplete => "CONFIG_INCOMPLETE",
            ErrorCode::ConfigRefreshFailed => "CONFIG_REFRESH_FAILED",
            ErrorCode::ConfigSetupFailed => "CONFIG_SETUP_FAILED",
            ErrorCode::ConfigSourceUnknown => "CONFIG_SOURCE_UNKNOWN",
            ErrorCode::ContainerRunning => "CONTAINER_RUNNING",
            ErrorCode::ContainerError => "CONTAINER_ERROR",
            ErrorCode::SafetyCheckFailed => "SAFETY_CHECK_FAILED",
            ErrorCode::GitStateFailed => "GIT_STATE_FAILED",
            ErrorCode::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            ErrorCode::WorkspaceDeleteFailed => "WORKSPACE_DELETE_FAILED",
            ErrorCode::StateReadFailed => "STATE_READ_FAILED",
            ErrorCode::StateWriteFailed => "STATE_WRITE_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure result shared by all orchestration flows.
#[derive(Debug, Clone)]
pub struct FlowError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
    /// Set when the container was running before the flow acted on it.
    pub was_running: bool,
    /// Matching workspace names for `AMBIGUOUS_MATCH`.
    pub candidates: Vec<String>,
    /// Report that triggered `SAFETY_CHECK_FAILED`.
    pub git_state: Option<GitState>,
    pub blockers: Vec<String>,
}

impl FlowError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
            was_running: false,
            candidates: Vec::new(),
            git_state: None,
            blockers: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_was_running(mut self, was_running: bool) -> Self {
        self.was_running = was_running;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_safety(mut self, git_state: GitState, blockers: Vec<String>) -> Self {
        self.git_state = Some(git_state);
        self.blockers = blockers;
        self
    }

    pub fn state_read(e: &io::Error) -> Self {
        FlowError::new(
            ErrorCode::StateReadFailed,
            format!("failed to read instance state: {e}"),
        )
    }

    pub fn state_write(e: &io::Error) -> Self {
        FlowError::new(
            ErrorCode::StateWriteFailed,
            format!("failed to write instance state: {e}"),
        )
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FlowError {}

impl From<NameError> for FlowError {
    fn from(e: NameError) -> Self {
        FlowError::new(ErrorCode::InvalidName, e.to_string())
    }
}

impl From<ContainerError> for FlowError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::RuntimeUnavailable(msg) => {
                FlowError::new(ErrorCode::RuntimeUnavailable, msg).with_suggestion(
                    "Start Docker (or OrbStack/Colima) and make sure `docker info` succeeds.",
                )
            }
            ContainerError::CommandFailed {
                operation,
                message,
                suggestion,
            } => {
                let mut fe = FlowError::new(
                    ErrorCode::ContainerError,
                    format!("container {operation} failed: {message}"),
                );
                fe.suggestion = suggestion;
                fe
            }
        }
    }
}

impl From<GitStateError> for FlowError {
    fn from(e: GitStateError) -> Self {
        FlowError::new(ErrorCode::GitStateFailed, e.to_string()).with_suggestion(
            "The workspace may not be a valid git repository; use --force to remove it anyway.",
        )
    }
}

impl From<RepoError> for FlowError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::CloneFailed(_) => FlowError::new(ErrorCode::CloneFailed, e.to_string())
                .with_suggestion("Check the URL and your git credentials."),
            RepoError::NoRemote(_) => FlowError::new(ErrorCode::InvalidUrl, e.to_string()),
        }
    }
}

impl From<ConfigError> for FlowError {
    fn from(e: ConfigError) -> Self {
        let code = match e {
            ConfigError::Missing(_) => ErrorCode::ConfigMissing,
            ConfigError::Incomplete(_) => ErrorCode::ConfigIncomplete,
            ConfigError::Io(..) => ErrorCode::ConfigRefreshFailed,
        };
        FlowError::new(code, e.to_string())
    }
}

impl FlowError {
    /// Config failure while a new workspace is being set up. Missing and
    /// incomplete configs keep their codes; I/O and parse failures of the
    /// baseline bundle are not refreshes.
    pub fn config_setup(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(..) => FlowError::new(
                ErrorCode::ConfigSetupFailed,
                format!("cannot prepare the baseline devcontainer config: {e}"),
            )
            .with_suggestion("Check the baseline bundle (`baseline_dir` in config.yml or DEVBOX_BASELINE_DIR)."),
            other => other.into(),
        }
    }
}

/// Map a flow error to a process exit code.
pub fn exit_code_for_flow_error(e: &FlowError) -> u8 {
    match e.code {
        ErrorCode::InvalidName
        | ErrorCode::InvalidUrl
        | ErrorCode::WorkspaceExists
        | ErrorCode::WorkspaceNotFound
        | ErrorCode::AmbiguousMatch => 2,
        ErrorCode::RuntimeUnavailable => 3,
        _ => 1,
    }
}

/// Map an io::Error to a process exit code: 127 for NotFound, 1 otherwise.
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}
