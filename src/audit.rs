//! Append-only record of forced removals (`<base>/audit.log`, one JSON object per line).
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gitstate::GitState;
use crate::state::now_rfc3339;

pub const FORCE_REMOVE_ACTION: &str = "force-remove";

/// How a forced removal was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationMethod {
    YesFlag,
    TypedName,
    /// The instance was already clean, so no confirmation was asked for.
    NotRequired,
}

impl ConfirmationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationMethod::YesFlag => "yes-flag",
            ConfirmationMethod::TypedName => "typed-name",
            ConfirmationMethod::NotRequired => "not-required",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: String,
    pub action: &'static str,
    pub instance_name: String,
    pub git_state: Option<GitState>,
    pub confirmation_method: ConfirmationMethod,
}

impl AuditLogEntry {
    pub fn force_remove(
        instance_name: &str,
        git_state: Option<GitState>,
        confirmation_method: ConfirmationMethod,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            action: FORCE_REMOVE_ACTION,
            instance_name: instance_name.to_string(),
            git_state,
            confirmation_method,
        }
    }
}

/// Append one entry as a single line, creating the file and its parent as needed.
pub fn append_audit_entry(log_path: &Path, entry: &AuditLogEntry) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(entry)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    line.push('\n');
    let mut f = OpenOptions::new().create(true).append(true).open(log_path)?;
    f.write_all(line.as_bytes())?;
    f.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_one_line_per_entry() {
        let td = tempfile::tempdir().unwrap();
        let log = td.path().join("nested").join("audit.log");
        let dirty = GitState {
            has_staged: true,
            staged_count: 1,
            ..GitState::default()
        };
        append_audit_entry(
            &log,
            &AuditLogEntry::force_remove("repo-a", Some(dirty), ConfirmationMethod::YesFlag),
        )
        .unwrap();
        append_audit_entry(
            &log,
            &AuditLogEntry::force_remove("repo-b", None, ConfirmationMethod::NotRequired),
        )
        .unwrap();

        let text = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "force-remove");
        assert_eq!(first["instanceName"], "repo-a");
        assert_eq!(first["confirmationMethod"], "yes-flag");
        assert_eq!(first["gitState"]["hasStaged"], true);
        assert_eq!(first["gitState"]["isClean"], false);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["gitState"].is_null());
        assert_eq!(second["confirmationMethod"], "not-required");
    }
}
