//! Lifecycle orchestration for containerized development instances.
//!
//! An instance is one repository clone plus one devcontainer, identified by
//! `<repoSlug>-<instance>` under `<base>/workspaces/`. The four flows
//! ([`Orchestrator::create`], [`Orchestrator::attach`],
//! [`Orchestrator::rebuild`], [`Orchestrator::remove`]) compose naming,
//! state persistence, git-state detection, the safety gate and the container
//! backend.
pub mod audit;
pub mod backend;
pub mod color;
pub mod config;
pub mod container;
pub mod devconfig;
pub mod errors;
pub mod flows;
pub mod git;
pub mod gitstate;
pub mod naming;
pub mod safety;
pub mod state;
pub mod telemetry;
pub mod util;
pub mod workspace;

pub use audit::{append_audit_entry, AuditLogEntry, ConfirmationMethod};
pub use backend::{ContainerBackend, RepoBackend, RepoError};
pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use config::{Config, Timeouts};
pub use container::{ContainerError, ContainerStatus, DockerCli, UpOutcome, UpRequest};
pub use errors::{exit_code_for_flow_error, exit_code_for_io_error, ErrorCode, FlowError};
pub use flows::{
    AttachOutcome, ConfirmFn, CreateOutcome, CreateRequest, Orchestrator, ProgressFn,
    RebuildOutcome, RemoveOutcome, RemoveRequest,
};
pub use git::GitCli;
pub use gitstate::{GitState, GitStateError};
pub use naming::{
    compress_slug, derive_container_name, derive_repo_slug, derive_workspace_name, WorkspacePath,
};
pub use safety::{build_safety_report, evaluate_safety_checks, SafetyReport, Severity};
pub use state::{
    create_initial_state, ensure_git_exclude, read_state, write_state_atomic, ConfigSource,
    InstanceState, NewInstance,
};
pub use telemetry::init_logging;
pub use workspace::{find_workspace_by_name, list_instances, InstanceSummary};
