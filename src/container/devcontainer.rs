//! Interpretation of devcontainer `up` output.
//!
//! The tool prints free-text lifecycle logs followed by one JSON result
//! record. The result is found by parsing the whole stdout first, then by
//! scanning lines backwards for the last record carrying an `outcome`.
//! Everything else is opaque diagnostic text and is line-capped before it
//! reaches a human.
use serde::Deserialize;

use super::{ContainerError, UpOutcome};
use crate::util::cap_tail_lines;

/// Maximum lines kept from each free-text section of a failure diagnostic.
pub const DIAGNOSTIC_TAIL_LINES: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpResult {
    pub outcome: String,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub remote_workspace_folder: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpResult {
    pub fn is_success(&self) -> bool {
        self.outcome == "success"
    }
}

/// Find the structured result in `up` stdout.
pub fn parse_up_result(stdout: &str) -> Option<UpResult> {
    let whole = stdout.trim();
    if whole.is_empty() {
        return None;
    }
    if let Ok(r) = serde_json::from_str::<UpResult>(whole) {
        return Some(r);
    }
    whole
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| serde_json::from_str::<UpResult>(l).ok())
}

fn is_json_record(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('{') && serde_json::from_str::<serde_json::Value>(t).is_ok()
}

/// Free-text lines of the output, with structured records removed.
pub fn lifecycle_lines(output: &str) -> Vec<&str> {
    output.lines().filter(|l| !is_json_record(l)).collect()
}

fn is_name_conflict(text: &str) -> bool {
    let t = text.to_ascii_lowercase();
    t.contains("is already in use by container") || t.contains("conflict. the container name")
}

fn generic_hint() -> String {
    "Check the devcontainer configuration and the output above; \
     re-run with DEVBOX_LOG=debug to see the exact command."
        .to_string()
}

fn conflict_hint(container_name: &str) -> String {
    format!(
        "A container named '{container_name}' already exists. Remove it with \
         `docker rm -f {container_name}` or rebuild the instance."
    )
}

/// Build the bounded failure diagnostic: result fields, then lifecycle log
/// lines, then stderr.
pub fn up_failure(
    container_name: &str,
    result: Option<&UpResult>,
    stdout: &str,
    stderr: &str,
) -> ContainerError {
    let mut sections: Vec<String> = Vec::new();
    if let Some(r) = result {
        let fields: Vec<&str> = [r.message.as_deref(), r.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !fields.is_empty() {
            sections.push(fields.join("\n"));
        }
    }
    let log = crate::util::TailCap::new(DIAGNOSTIC_TAIL_LINES).apply(lifecycle_lines(stdout));
    if !log.is_empty() {
        sections.push(log);
    }
    let err = cap_tail_lines(stderr, DIAGNOSTIC_TAIL_LINES);
    if !err.is_empty() {
        sections.push(err);
    }
    let message = if sections.is_empty() {
        "devcontainer up failed without output".to_string()
    } else {
        sections.join("\n\n")
    };

    let combined = format!("{stdout}\n{stderr}");
    let suggestion = if is_name_conflict(&combined) {
        conflict_hint(container_name)
    } else {
        generic_hint()
    };
    ContainerError::CommandFailed {
        operation: "start",
        message,
        suggestion: Some(suggestion),
    }
}

/// Decide success or failure of an `up` run from its exit status and output.
pub fn interpret_up_output(
    container_name: &str,
    exit_ok: bool,
    stdout: &str,
    stderr: &str,
) -> Result<UpOutcome, ContainerError> {
    let result = parse_up_result(stdout);
    let ok = match &result {
        Some(r) => exit_ok && r.is_success(),
        None => exit_ok,
    };
    if !ok {
        return Err(up_failure(container_name, result.as_ref(), stdout, stderr));
    }
    Ok(result
        .map(|r| UpOutcome {
            container_id: r.container_id.filter(|s| !s.trim().is_empty()),
            remote_workspace_folder: r.remote_workspace_folder,
        })
        .unwrap_or_default())
}
