//! `git` CLI adapter: clone, remote lookup and the concurrent state queries.
use std::path::Path;
use std::time::Duration;

use crate::backend::{RepoBackend, RepoError};
use crate::config::Config;
use crate::gitstate::{
    parse_branch_tracking, parse_stash_list, parse_status, GitState, GitStateError,
};
use crate::util::{ExecOutput, ExecRequest, ExecService};

const BRANCH_FORMAT: &str = "%(refname:short) %(upstream:short) %(upstream:track)";

#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    query_timeout: Duration,
    clone_timeout: Duration,
    exec: ExecService,
}

impl GitCli {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            program: cfg.git.clone(),
            query_timeout: cfg.timeouts.git,
            clone_timeout: cfg.timeouts.clone_repo,
            exec: ExecService::new(cfg.timeouts.git),
        }
    }

    /// Run a git command with `-C <repo>`.
    fn git(&self, repo: Option<&Path>, args: &[&str], timeout: Duration) -> anyhow::Result<ExecOutput> {
        let mut req = ExecRequest::new(&self.program);
        if let Some(r) = repo {
            req = req.arg("-C").arg(r);
        }
        // Read-only queries must not take the index lock.
        req = req
            .args(args)
            .env("GIT_OPTIONAL_LOCKS", "0")
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(timeout);
        self.exec.run(req)
    }

    fn query(&self, root: &Path, args: &[&str]) -> anyhow::Result<ExecOutput> {
        self.git(Some(root), args, self.query_timeout)
    }
}

/// Successful stdout or `None`, logging the degradation.
fn degrade(what: &str, res: anyhow::Result<ExecOutput>) -> Option<String> {
    match res {
        Ok(o) if o.success() => Some(o.stdout),
        Ok(o) => {
            tracing::warn!(query = what, error = %o.error_text(), "git query failed; treating as empty");
            None
        }
        Err(e) => {
            tracing::warn!(query = what, error = %format!("{e:#}"), "git query failed; treating as empty");
            None
        }
    }
}

impl RepoBackend for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RepoError> {
        let dest_str = dest.to_string_lossy();
        let out = self
            .git(None, &["clone", "--", url, &dest_str], self.clone_timeout)
            .map_err(|e| RepoError::CloneFailed(format!("{e:#}")))?;
        if out.success() {
            Ok(())
        } else {
            Err(RepoError::CloneFailed(out.error_text()))
        }
    }

    fn remote_url(&self, checkout: &Path) -> Result<String, RepoError> {
        let out = self
            .query(checkout, &["remote", "get-url", "origin"])
            .map_err(|e| RepoError::NoRemote(format!("{e:#}")))?;
        let url = out.stdout.trim().to_string();
        if out.success() && !url.is_empty() {
            Ok(url)
        } else {
            Err(RepoError::NoRemote(format!(
                "{} has no 'origin' remote: {}",
                checkout.display(),
                out.error_text()
            )))
        }
    }

    /// Four read-only queries run concurrently. Only a failing status query
    /// fails the whole report.
    fn git_state(&self, root: &Path) -> Result<GitState, GitStateError> {
        let (status, stash, branches, head) = std::thread::scope(|s| {
            let status = s.spawn(|| self.query(root, &["status", "--porcelain=v1"]));
            let stash = s.spawn(|| self.query(root, &["stash", "list"]));
            let branches =
                s.spawn(|| self.query(root, &["for-each-ref", &format!("--format={BRANCH_FORMAT}"), "refs/heads"]));
            let head = s.spawn(|| self.query(root, &["symbolic-ref", "-q", "HEAD"]));
            (status.join(), stash.join(), branches.join(), head.join())
        });

        let status = match status {
            Ok(Ok(o)) if o.success() => parse_status(&o.stdout),
            Ok(Ok(o)) => {
                return Err(GitStateError {
                    message: o.error_text(),
                })
            }
            Ok(Err(e)) => {
                return Err(GitStateError {
                    message: format!("{e:#}"),
                })
            }
            Err(_) => {
                return Err(GitStateError {
                    message: "status query panicked".to_string(),
                })
            }
        };
        let stash = stash
            .ok()
            .and_then(|r| degrade("stash", r))
            .map(|s| parse_stash_list(&s))
            .unwrap_or_default();
        let branches = branches
            .ok()
            .and_then(|r| degrade("branches", r))
            .map(|s| parse_branch_tracking(&s))
            .unwrap_or_default();
        let detached = !matches!(head, Ok(Ok(ref o)) if o.success());

        Ok(GitState::from_parts(status, stash, branches, detached))
    }
}
