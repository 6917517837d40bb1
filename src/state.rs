//! Per-instance metadata persisted as `<workspace>/.devbox/state.json`.
//!
//! Reads are corruption tolerant: a missing, malformed or foreign-schema file
//! yields a fallback state instead of an error. Writes go through a sibling
//! `*.tmp` file and a rename so a reader never sees a half-written file.
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::naming::{derive_container_name, METADATA_DIR_NAME};

/// Placeholder used by the fallback state for values that could not be read.
pub const UNKNOWN: &str = "unknown";

/// Which devcontainer config is authoritative for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Bundled config copied into the metadata dir and patched with the container name.
    Baseline,
    /// The repository's own `.devcontainer` config, left untouched.
    Repo,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::Baseline => "baseline",
            ConfigSource::Repo => "repo",
        }
    }
}

/// Persisted instance metadata.
///
/// Unknown fields are rejected so that files written by an older layout are
/// treated like corrupt files rather than misread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstanceState {
    pub instance: String,
    pub repo_slug: String,
    pub repo_url: String,
    pub created_at: String,
    pub last_attached: String,
    pub purpose: Option<String>,
    /// Name the runtime actually assigned, which can differ from the derived default.
    pub container_name: String,
    /// `None` for instances created before the source was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_source: Option<ConfigSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rebuilt: Option<String>,
}

impl InstanceState {
    /// True for states synthesized by [`read_state`] when the file was unusable.
    pub fn is_fallback(&self) -> bool {
        self.repo_url == UNKNOWN && self.created_at == UNKNOWN
    }
}

/// Inputs for [`create_initial_state`].
#[derive(Debug, Clone, Default)]
pub struct NewInstance {
    pub instance: String,
    pub repo_slug: String,
    pub repo_url: String,
    pub workspace_name: String,
    pub purpose: Option<String>,
    /// Overrides the derived default container name.
    pub container_name: Option<String>,
    /// Defaults to [`ConfigSource::Baseline`].
    pub config_source: Option<ConfigSource>,
}

/// Current UTC time as RFC 3339 with second precision.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0)
        .unwrap_or(now)
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub fn create_initial_state(new: &NewInstance) -> InstanceState {
    let now = now_rfc3339();
    InstanceState {
        instance: new.instance.clone(),
        repo_slug: new.repo_slug.clone(),
        repo_url: new.repo_url.clone(),
        created_at: now.clone(),
        last_attached: now,
        purpose: new.purpose.clone(),
        container_name: new
            .container_name
            .clone()
            .unwrap_or_else(|| derive_container_name(&new.workspace_name)),
        config_source: Some(new.config_source.unwrap_or(ConfigSource::Baseline)),
        last_rebuilt: None,
    }
}

/// State used when the state file is missing or unusable. The container name
/// is derived from the workspace folder that holds the metadata dir.
pub fn fallback_state(state_file: &Path) -> InstanceState {
    let folder = state_file
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .and_then(|s| s.to_str());
    InstanceState {
        instance: UNKNOWN.to_string(),
        repo_slug: UNKNOWN.to_string(),
        repo_url: UNKNOWN.to_string(),
        created_at: UNKNOWN.to_string(),
        last_attached: UNKNOWN.to_string(),
        purpose: None,
        container_name: folder
            .map(derive_container_name)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        config_source: None,
        last_rebuilt: None,
    }
}

/// Read the state file.
///
/// Returns the fallback state for a missing file, unparsable content, or
/// content that fails schema validation. Every other I/O error is returned.
pub fn read_state(state_file: &Path) -> io::Result<InstanceState> {
    let text = match fs::read_to_string(state_file) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %state_file.display(), "state file missing; using fallback");
            return Ok(fallback_state(state_file));
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            tracing::warn!(path = %state_file.display(), "state file is not UTF-8; using fallback");
            return Ok(fallback_state(state_file));
        }
        Err(e) => return Err(e),
    };
    match serde_json::from_str::<InstanceState>(&text) {
        Ok(state) => Ok(state),
        Err(e) => {
            tracing::warn!(path = %state_file.display(), error = %e, "unusable state file; using fallback");
            Ok(fallback_state(state_file))
        }
    }
}

fn tmp_path_for(state_file: &Path) -> PathBuf {
    let mut name = state_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    state_file.with_file_name(name)
}

/// Write pretty JSON with a trailing newline to `<file>.tmp`, then rename it
/// over `state_file`. On rename failure the previous file is untouched and the
/// tmp file is left in place.
pub fn write_state_atomic(state_file: &Path, state: &InstanceState) -> io::Result<()> {
    if let Some(parent) = state_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(state).map_err(io::Error::other)?;
    text.push('\n');

    let tmp = tmp_path_for(state_file);
    fs::write(&tmp, text.as_bytes())?;
    fs::rename(&tmp, state_file).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!(
                "failed to move {} over {}: {e} (temporary file kept)",
                tmp.display(),
                state_file.display()
            ),
        )
    })
}

/// Add the metadata dir to the clone's `.git/info/exclude` once.
/// A repository without that file is left alone.
pub fn ensure_git_exclude(root: &Path) -> io::Result<()> {
    let exclude = root.join(".git").join("info").join("exclude");
    let current = match fs::read_to_string(&exclude) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let rule = format!("/{METADATA_DIR_NAME}/");
    let already = current.lines().map(str::trim).any(|l| {
        l == rule || l == format!("/{METADATA_DIR_NAME}") || l == format!("{METADATA_DIR_NAME}/")
    });
    if already {
        return Ok(());
    }
    let mut f = OpenOptions::new().append(true).open(&exclude)?;
    if !current.is_empty() && !current.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    writeln!(f, "{rule}")
}
