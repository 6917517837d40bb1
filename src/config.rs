//! Runtime configuration: defaults, then `<base>/config.yml`, then environment.
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Per-step limits for external commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Runtime availability probe.
    pub probe: Duration,
    /// Each git-state query.
    pub git: Duration,
    pub clone_repo: Duration,
    /// devcontainer `up`.
    pub up: Duration,
    /// Other runtime calls (inspect, stop, rm).
    pub docker: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(5),
            git: Duration::from_secs(10),
            clone_repo: Duration::from_secs(600),
            up: Duration::from_secs(900),
            docker: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root for `workspaces/`, `config.yml` and the audit log.
    pub base_dir: PathBuf,
    pub docker: String,
    pub devcontainer: String,
    pub git: String,
    /// Directory copied as the baseline devcontainer bundle; the built-in
    /// bundle is used when unset.
    pub baseline_dir: Option<PathBuf>,
    /// Name of the persistent terminal session inside the container.
    pub session_name: String,
    pub timeouts: Timeouts,
}

impl Config {
    /// Defaults rooted at `base_dir`, ignoring files and environment.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            docker: "docker".to_string(),
            devcontainer: "devcontainer".to_string(),
            git: "git".to_string(),
            baseline_dir: None,
            session_name: "main".to_string(),
            timeouts: Timeouts::default(),
        }
    }

    /// Resolve the effective configuration for this invocation.
    pub fn load() -> io::Result<Self> {
        let base_dir = match env_nonempty("DEVBOX_HOME") {
            Some(p) => PathBuf::from(p),
            None => default_base_dir()?,
        };
        let mut cfg = Self::with_base_dir(base_dir);
        let file = cfg.config_file();
        if let Some(fc) = read_file_config(&file)? {
            cfg.apply_file(fc);
        }
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.yml")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    fn apply_file(&mut self, fc: FileConfig) {
        if let Some(v) = fc.docker {
            self.docker = v;
        }
        if let Some(v) = fc.devcontainer {
            self.devcontainer = v;
        }
        if let Some(v) = fc.git {
            self.git = v;
        }
        if let Some(v) = fc.baseline_dir {
            self.baseline_dir = Some(v);
        }
        if let Some(v) = fc.session_name {
            self.session_name = v;
        }
        if let Some(t) = fc.timeouts {
            let set = |slot: &mut Duration, secs: Option<u64>| {
                if let Some(s) = secs {
                    *slot = Duration::from_secs(s);
                }
            };
            set(&mut self.timeouts.probe, t.probe);
            set(&mut self.timeouts.git, t.git);
            set(&mut self.timeouts.clone_repo, t.clone);
            set(&mut self.timeouts.up, t.up);
            set(&mut self.timeouts.docker, t.docker);
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_nonempty("DEVBOX_DOCKER") {
            self.docker = v;
        }
        if let Some(v) = env_nonempty("DEVBOX_DEVCONTAINER") {
            self.devcontainer = v;
        }
        if let Some(v) = env_nonempty("DEVBOX_BASELINE_DIR") {
            self.baseline_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env_nonempty("DEVBOX_SESSION") {
            self.session_name = v;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    docker: Option<String>,
    devcontainer: Option<String>,
    git: Option<String>,
    baseline_dir: Option<PathBuf>,
    session_name: Option<String>,
    timeouts: Option<FileTimeouts>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTimeouts {
    probe: Option<u64>,
    git: Option<u64>,
    clone: Option<u64>,
    up: Option<u64>,
    docker: Option<u64>,
}

fn read_file_config(path: &Path) -> io::Result<Option<FileConfig>> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str::<FileConfig>(&text)
        .map(Some)
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid config file {}: {e}", path.display()),
            )
        })
}

fn default_base_dir() -> io::Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(".devbox"))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "cannot determine home directory; set DEVBOX_HOME",
            )
        })
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_override_defaults() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.yml");
        fs::write(
            &path,
            "docker: podman\nbaseline_dir: /opt/baseline\ntimeouts:\n  up: 30\n  git: 2\n",
        )
        .unwrap();
        let mut cfg = Config::with_base_dir(td.path());
        cfg.apply_file(read_file_config(&path).unwrap().unwrap());
        assert_eq!(cfg.docker, "podman");
        assert_eq!(cfg.devcontainer, "devcontainer");
        assert_eq!(cfg.baseline_dir, Some(PathBuf::from("/opt/baseline")));
        assert_eq!(cfg.timeouts.up, Duration::from_secs(30));
        assert_eq!(cfg.timeouts.git, Duration::from_secs(2));
        assert_eq!(cfg.timeouts.clone_repo, Timeouts::default().clone_repo);
    }

    #[test]
    fn test_missing_or_empty_file_is_none() {
        let td = tempfile::tempdir().unwrap();
        assert!(read_file_config(&td.path().join("nope.yml")).unwrap().is_none());
        let empty = td.path().join("empty.yml");
        fs::write(&empty, "\n").unwrap();
        assert!(read_file_config(&empty).unwrap().is_none());
    }

    #[test]
    fn test_unknown_key_is_an_error_naming_the_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.yml");
        fs::write(&path, "dockr: podman\n").unwrap();
        let err = read_file_config(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("config.yml"), "{err}");
    }
}
