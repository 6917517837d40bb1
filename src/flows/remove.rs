use std::fs;
use std::io;

use tracing::instrument;

use super::Orchestrator;
use crate::audit::{append_audit_entry, AuditLogEntry, ConfirmationMethod};
use crate::backend::{ContainerBackend, RepoBackend};
use crate::errors::{ErrorCode, FlowError};
use crate::gitstate::GitState;
use crate::naming::WorkspacePath;
use crate::safety::{build_safety_report, SafetyReport};
use crate::state::read_state;

/// Asked for the instance name before a forced removal of a dirty instance.
/// Receives the workspace name and the safety report (when git state could be
/// computed); returns what the user typed, or `None` when nobody can answer.
pub type ConfirmFn<'a> = &'a mut dyn FnMut(&str, Option<&SafetyReport>) -> Option<String>;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveRequest {
    /// Skip the safety gate; the removal is audit-logged.
    pub force: bool,
    /// Authorizes a forced removal without asking.
    pub yes: bool,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub workspace: WorkspacePath,
    pub forced: bool,
    pub confirmation: Option<ConfirmationMethod>,
    pub git_state: Option<GitState>,
    /// False when a forced removal succeeded but its audit entry could not be written.
    pub audit_logged: bool,
}

impl<C: ContainerBackend, R: RepoBackend> Orchestrator<C, R> {
    /// Stop and remove the container, then delete the workspace.
    ///
    /// Without `force`, any uncommitted, stashed or unpushed work blocks the
    /// removal. With `force`, the git state is still computed for the audit
    /// entry but never blocks.
    #[instrument(level = "info", err, skip(self, confirm))]
    pub fn remove(
        &self,
        query: &str,
        req: RemoveRequest,
        confirm: Option<ConfirmFn<'_>>,
    ) -> Result<RemoveOutcome, FlowError> {
        let ws = self.locate(query)?;

        let (git_state, confirmation) = if req.force {
            let (git_state, method) = self.authorize_force(&ws, req.yes, confirm)?;
            (git_state, Some(method))
        } else {
            let git_state = self.repo.git_state(&ws.root)?;
            let report = build_safety_report(&git_state);
            if !report.is_clean() {
                let blockers: Vec<String> = report.blockers.iter().map(|b| b.message.clone()).collect();
                let mut suggestion = report.suggestions.join("; ");
                if !suggestion.is_empty() {
                    suggestion.push_str(". ");
                }
                suggestion.push_str(&report.force_hint);
                return Err(FlowError::new(
                    ErrorCode::SafetyCheckFailed,
                    format!("'{}' has work that would be lost: {}", ws.name, blockers.join("; ")),
                )
                .with_suggestion(suggestion)
                .with_safety(git_state, blockers));
            }
            (Some(git_state), None)
        };

        let container_name = match read_state(&ws.state_file) {
            Ok(s) => s.container_name,
            Err(e) => {
                tracing::warn!(workspace = %ws.name, error = %e, "cannot read state; using derived container name");
                ws.default_container_name()
            }
        };
        self.containers.stop(&container_name)?;
        self.containers.remove(&container_name)?;

        match fs::remove_dir_all(&ws.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FlowError::new(
                    ErrorCode::WorkspaceDeleteFailed,
                    format!("container removed but {} could not be deleted: {e}", ws.root.display()),
                )
                .with_suggestion(format!("Delete {} manually.", ws.root.display())))
            }
        }
        tracing::info!(workspace = %ws.name, container = %container_name, "instance removed");

        let mut audit_logged = false;
        if let Some(method) = confirmation {
            let entry = AuditLogEntry::force_remove(&ws.name, git_state.clone(), method);
            let log = self.config.audit_log_path();
            match append_audit_entry(&log, &entry) {
                Ok(()) => audit_logged = true,
                Err(e) => {
                    tracing::error!(path = %log.display(), error = %e, "failed to append audit entry")
                }
            }
        }

        Ok(RemoveOutcome {
            workspace: ws,
            forced: req.force,
            confirmation,
            git_state,
            audit_logged,
        })
    }

    /// Decide how a forced removal is authorized: clean instances need no
    /// confirmation, otherwise the yes flag or the typed instance name.
    fn authorize_force(
        &self,
        ws: &WorkspacePath,
        yes: bool,
        confirm: Option<ConfirmFn<'_>>,
    ) -> Result<(Option<GitState>, ConfirmationMethod), FlowError> {
        let git_state = match self.repo.git_state(&ws.root) {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(workspace = %ws.name, error = %e, "git state unavailable for forced removal");
                None
            }
        };
        let report = git_state.as_ref().map(build_safety_report);
        if let Some(r) = report.as_ref().filter(|r| !r.is_clean()) {
            for b in &r.blockers {
                tracing::warn!(workspace = %ws.name, severity = b.severity.as_str(), "{}", b.message);
            }
        }

        if report.as_ref().is_some_and(SafetyReport::is_clean) {
            return Ok((git_state, ConfirmationMethod::NotRequired));
        }
        if yes {
            return Ok((git_state, ConfirmationMethod::YesFlag));
        }
        let typed = confirm.and_then(|f| f(&ws.name, report.as_ref()));
        match typed {
            Some(t) if t.trim() == ws.name => Ok((git_state, ConfirmationMethod::TypedName)),
            Some(_) => Err(FlowError::new(
                ErrorCode::ConfirmationRequired,
                format!("confirmation did not match '{}'; nothing was removed", ws.name),
            )),
            None => Err(FlowError::new(
                ErrorCode::ConfirmationRequired,
                format!("forced removal of '{}' needs confirmation", ws.name),
            )
            .with_suggestion("Pass --yes, or run interactively and type the instance name.")),
        }
    }
}
