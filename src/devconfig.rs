//! Devcontainer config materialization.
//!
//! A repository that ships its own `.devcontainer` config is used untouched.
//! Otherwise the baseline bundle is copied into the workspace metadata dir
//! (which the clone's git exclude hides) and patched so the runtime names the
//! container after the workspace.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::naming::WorkspacePath;
use crate::state::ConfigSource;
use crate::util::fs::{copy_dir_recursive, remove_dir_all_if_exists};

pub const CONFIG_FILE_NAME: &str = "devcontainer.json";
const BASELINE_DIR_NAME: &str = "devcontainer";
const BUILTIN_BASELINE: &str = include_str!("../assets/baseline/devcontainer.json");

#[derive(Debug)]
pub enum ConfigError {
    /// Neither a repository config nor the expected baseline config exists.
    Missing(String),
    /// `.devcontainer/` exists but has no `devcontainer.json`.
    Incomplete(String),
    Io(String, io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(msg) | ConfigError::Incomplete(msg) => f.write_str(msg),
            ConfigError::Io(what, e) => write!(f, "{what}: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// What the clone itself provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoConfig {
    Present(PathBuf),
    Incomplete(PathBuf),
    Absent,
}

pub fn baseline_config_dir(ws: &WorkspacePath) -> PathBuf {
    ws.metadata_dir.join(BASELINE_DIR_NAME)
}

pub fn baseline_config_file(ws: &WorkspacePath) -> PathBuf {
    baseline_config_dir(ws).join(CONFIG_FILE_NAME)
}

/// Config file to hand to the start step: the baseline file for baseline
/// instances, nothing (tool default lookup) for repository configs.
pub fn config_file_for(ws: &WorkspacePath, source: ConfigSource) -> Option<PathBuf> {
    match source {
        ConfigSource::Baseline => Some(baseline_config_file(ws)),
        ConfigSource::Repo => None,
    }
}

pub fn detect_repo_config(root: &Path) -> RepoConfig {
    let dir = root.join(".devcontainer");
    let nested = dir.join(CONFIG_FILE_NAME);
    if nested.is_file() {
        return RepoConfig::Present(nested);
    }
    let top = root.join(".devcontainer.json");
    if top.is_file() {
        return RepoConfig::Present(top);
    }
    if dir.is_dir() {
        return RepoConfig::Incomplete(dir);
    }
    RepoConfig::Absent
}

/// Decide the config source for a fresh clone and materialize the baseline
/// bundle when the repository has no config.
pub fn materialize_config(
    ws: &WorkspacePath,
    baseline_dir: Option<&Path>,
    container_name: &str,
) -> Result<ConfigSource, ConfigError> {
    match detect_repo_config(&ws.root) {
        RepoConfig::Present(path) => {
            tracing::info!(config = %path.display(), "using repository devcontainer config");
            Ok(ConfigSource::Repo)
        }
        RepoConfig::Incomplete(dir) => Err(incomplete(&dir)),
        RepoConfig::Absent => {
            let dest = baseline_config_dir(ws);
            write_baseline_bundle(&dest, baseline_dir)
                .map_err(|e| ConfigError::Io(format!("copy baseline config to {}", dest.display()), e))?;
            let file = dest.join(CONFIG_FILE_NAME);
            patch_container_name(&file, container_name)
                .map_err(|e| ConfigError::Io(format!("patch {}", file.display()), e))?;
            tracing::info!(config = %file.display(), "materialized baseline devcontainer config");
            Ok(ConfigSource::Baseline)
        }
    }
}

/// Replace the live baseline config with a freshly staged and patched copy.
/// The live dir is only touched once staging fully succeeded.
pub fn refresh_baseline(
    ws: &WorkspacePath,
    baseline_dir: Option<&Path>,
    container_name: &str,
) -> Result<(), ConfigError> {
    fs::create_dir_all(&ws.metadata_dir)
        .map_err(|e| ConfigError::Io(format!("create {}", ws.metadata_dir.display()), e))?;
    let staging = tempfile::Builder::new()
        .prefix(".devcontainer-staging-")
        .tempdir_in(&ws.metadata_dir)
        .map_err(|e| ConfigError::Io("create staging directory".to_string(), e))?;

    write_baseline_bundle(staging.path(), baseline_dir)
        .map_err(|e| ConfigError::Io("stage baseline config".to_string(), e))?;
    patch_container_name(&staging.path().join(CONFIG_FILE_NAME), container_name)
        .map_err(|e| ConfigError::Io("patch staged config".to_string(), e))?;

    let live = baseline_config_dir(ws);
    remove_dir_all_if_exists(&live)
        .map_err(|e| ConfigError::Io(format!("remove {}", live.display()), e))?;
    fs::rename(staging.path(), &live)
        .map_err(|e| ConfigError::Io(format!("move staged config to {}", live.display()), e))?;
    Ok(())
}

/// Check that a repository-config instance still has a usable config.
pub fn verify_repo_config(root: &Path) -> Result<(), ConfigError> {
    match detect_repo_config(root) {
        RepoConfig::Present(_) => Ok(()),
        RepoConfig::Incomplete(dir) => Err(incomplete(&dir)),
        RepoConfig::Absent => Err(ConfigError::Missing(format!(
            "repository devcontainer config not found under {}",
            root.display()
        ))),
    }
}

fn incomplete(dir: &Path) -> ConfigError {
    ConfigError::Incomplete(format!(
        "{} exists but has no {CONFIG_FILE_NAME}",
        dir.display()
    ))
}

/// Copy the configured bundle directory, or write the built-in one.
pub fn write_baseline_bundle(dest: &Path, baseline_dir: Option<&Path>) -> io::Result<()> {
    match baseline_dir {
        Some(src) => {
            if !src.join(CONFIG_FILE_NAME).is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("baseline bundle {} has no {CONFIG_FILE_NAME}", src.display()),
                ));
            }
            copy_dir_recursive(src, dest)
        }
        None => {
            fs::create_dir_all(dest)?;
            fs::write(dest.join(CONFIG_FILE_NAME), BUILTIN_BASELINE)
        }
    }
}

/// Set `--name <container_name>` in the config's `runArgs`, dropping any
/// previous name argument.
pub fn patch_container_name(config_file: &Path, container_name: &str) -> io::Result<()> {
    let text = fs::read_to_string(config_file)?;
    let mut doc: Value = serde_json::from_str(&strip_trailing_commas(&strip_jsonc_comments(&text)))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let obj = doc.as_object_mut().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "devcontainer config is not a JSON object")
    })?;

    let previous: Vec<Value> = match obj.remove("runArgs") {
        Some(Value::Array(a)) => a,
        _ => Vec::new(),
    };
    let mut run_args: Vec<Value> = Vec::with_capacity(previous.len() + 2);
    let mut skip_next = false;
    for arg in previous {
        if skip_next {
            skip_next = false;
            continue;
        }
        let is_name_flag = arg.as_str() == Some("--name");
        let is_inline_name = arg.as_str().is_some_and(|s| s.starts_with("--name="));
        if is_name_flag {
            skip_next = true;
        } else if !is_inline_name {
            run_args.push(arg);
        }
    }
    run_args.push(Value::from("--name"));
    run_args.push(Value::from(container_name));
    obj.insert("runArgs".to_string(), Value::Array(run_args));

    let mut out = serde_json::to_string_pretty(&doc).map_err(io::Error::other)?;
    out.push('\n');
    fs::write(config_file, out)
}

/// Drop commas that directly precede a closing `}` or `]` outside string
/// literals. Run after comments are stripped.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&n) = chars.get(i + 1) {
                    out.push(n);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

/// Drop `//` and `/* */` comments outside string literals.
pub fn strip_jsonc_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(n) = chars.next() {
                        out.push(n);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws_in(td: &tempfile::TempDir) -> WorkspacePath {
        let ws = WorkspacePath::new(td.path(), "widget-dev");
        fs::create_dir_all(&ws.root).unwrap();
        ws
    }

    fn run_args(file: &Path) -> Vec<String> {
        let v: Value = serde_json::from_str(&fs::read_to_string(file).unwrap()).unwrap();
        v["runArgs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_builtin_baseline_is_valid_json() {
        let v: Value = serde_json::from_str(BUILTIN_BASELINE).unwrap();
        assert!(v.is_object());
    }

    #[test]
    fn test_baseline_is_materialized_and_patched() {
        let td = tempfile::tempdir().unwrap();
        let ws = ws_in(&td);
        let src = materialize_config(&ws, None, "devbox-widget-dev").unwrap();
        assert_eq!(src, ConfigSource::Baseline);
        assert_eq!(run_args(&baseline_config_file(&ws)), vec!["--name", "devbox-widget-dev"]);
    }

    #[test]
    fn test_repository_config_is_left_untouched() {
        let td = tempfile::tempdir().unwrap();
        let ws = ws_in(&td);
        let dir = ws.root.join(".devcontainer");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE_NAME), "{ \"image\": \"x\" }").unwrap();
        let src = materialize_config(&ws, None, "devbox-widget-dev").unwrap();
        assert_eq!(src, ConfigSource::Repo);
        assert_eq!(
            fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap(),
            "{ \"image\": \"x\" }"
        );
        assert!(!baseline_config_dir(&ws).exists());
    }

    #[test]
    fn test_incomplete_repository_config_is_distinct() {
        let td = tempfile::tempdir().unwrap();
        let ws = ws_in(&td);
        fs::create_dir_all(ws.root.join(".devcontainer")).unwrap();
        assert!(matches!(verify_repo_config(&ws.root), Err(ConfigError::Incomplete(_))));
        fs::remove_dir_all(ws.root.join(".devcontainer")).unwrap();
        assert!(matches!(verify_repo_config(&ws.root), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_patch_replaces_existing_name_args() {
        let td = tempfile::tempdir().unwrap();
        let f = td.path().join(CONFIG_FILE_NAME);
        fs::write(
            &f,
            "{\n  // comment\n  \"runArgs\": [\"--init\", \"--name\", \"old\", \"--name=older\", \"--cap-add=SYS_PTRACE\"], /* x */ \"image\": \"a//b\"\n}",
        )
        .unwrap();
        patch_container_name(&f, "devbox-new").unwrap();
        assert_eq!(
            run_args(&f),
            vec!["--init", "--cap-add=SYS_PTRACE", "--name", "devbox-new"]
        );
        let v: Value = serde_json::from_str(&fs::read_to_string(&f).unwrap()).unwrap();
        assert_eq!(v["image"], "a//b");
    }

    #[test]
    fn test_patch_accepts_trailing_commas() {
        let td = tempfile::tempdir().unwrap();
        let f = td.path().join(CONFIG_FILE_NAME);
        fs::write(
            &f,
            "{ // base\n  \"image\": \"debian\",\n  \"runArgs\": [\"--init\",],\n  \"containerEnv\": { \"X\": \"a,}\" },\n}\n",
        )
        .unwrap();
        patch_container_name(&f, "devbox-new").unwrap();
        assert_eq!(run_args(&f), vec!["--init", "--name", "devbox-new"]);
        let v: Value = serde_json::from_str(&fs::read_to_string(&f).unwrap()).unwrap();
        assert_eq!(v["containerEnv"]["X"], "a,}");
    }

    #[test]
    fn test_trailing_commas_inside_strings_are_kept() {
        assert_eq!(strip_trailing_commas("[1, 2 ,\n]"), "[1, 2 \n]");
        assert_eq!(strip_trailing_commas(r#"{"a": "x,]", }"#), r#"{"a": "x,]" }"#);
        assert_eq!(strip_trailing_commas(r#"["\",]",]"#), r#"["\",]"]"#);
    }

    #[test]
    fn test_refresh_replaces_live_dir_and_removes_stale_files() {
        let td = tempfile::tempdir().unwrap();
        let ws = ws_in(&td);
        materialize_config(&ws, None, "devbox-widget-dev").unwrap();
        let stale = baseline_config_dir(&ws).join("stale.txt");
        fs::write(&stale, "x").unwrap();

        let bundle = td.path().join("bundle");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join(CONFIG_FILE_NAME), "{\"image\":\"custom\"}").unwrap();
        fs::write(bundle.join("setup.sh"), "true").unwrap();

        refresh_baseline(&ws, Some(&bundle), "devbox-widget-dev").unwrap();
        assert!(!stale.exists());
        assert!(baseline_config_dir(&ws).join("setup.sh").is_file());
        assert_eq!(run_args(&baseline_config_file(&ws)), vec!["--name", "devbox-widget-dev"]);
        let leftovers: Vec<_> = fs::read_dir(&ws.metadata_dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".devcontainer-staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_refresh_failure_keeps_live_config() {
        let td = tempfile::tempdir().unwrap();
        let ws = ws_in(&td);
        materialize_config(&ws, None, "devbox-widget-dev").unwrap();
        let before = fs::read_to_string(baseline_config_file(&ws)).unwrap();
        let missing = td.path().join("no-bundle");
        assert!(refresh_baseline(&ws, Some(&missing), "devbox-widget-dev").is_err());
        assert_eq!(fs::read_to_string(baseline_config_file(&ws)).unwrap(), before);
    }
}
