//! Removal blockers derived from a [`GitState`].
//!
//! `evaluate_safety_checks` yields one message per violated condition. The
//! richer [`SafetyReport`] adds a severity per blocker, suggestions and the
//! force hint for display; severity is never stored.
use crate::color::paint;
use crate::gitstate::GitState;

/// Risk class of a blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Work that still exists somewhere recoverable (tree, stash, local commits with an upstream).
    Warning,
    /// Work likely lost for good once the clone is deleted.
    Danger,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyReport {
    pub blockers: Vec<Blocker>,
    pub suggestions: Vec<String>,
    pub force_hint: String,
}

fn count_noun(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn blockers_for(state: &GitState) -> Vec<Blocker> {
    let mut out = Vec::new();
    let mut warn = |message: String| {
        out.push(Blocker {
            message,
            severity: Severity::Warning,
        })
    };
    if state.has_staged {
        warn(format!(
            "{} with staged changes",
            count_noun(state.staged_count, "file", "files")
        ));
    }
    if state.has_unstaged {
        warn(format!(
            "{} with unstaged changes",
            count_noun(state.unstaged_count, "file", "files")
        ));
    }
    if state.has_untracked {
        warn(count_noun(
            state.untracked_count,
            "untracked file",
            "untracked files",
        ));
    }
    if state.stash_count > 0 {
        let mut msg = count_noun(state.stash_count, "stash", "stashes");
        if let Some(first) = state.first_stash_message.as_deref() {
            msg.push_str(&format!(" (latest: {first})"));
        }
        warn(msg);
    }
    if !state.unpushed_branches.is_empty() {
        let list = state
            .unpushed_branches
            .iter()
            .map(|b| {
                let n = state.unpushed_commit_counts.get(b).copied().unwrap_or(0) as usize;
                format!("{b} ({})", count_noun(n, "commit", "commits"))
            })
            .collect::<Vec<_>>()
            .join(", ");
        warn(format!("Unpushed commits on: {list}"));
    }
    if !state.never_pushed_branches.is_empty() {
        out.push(Blocker {
            message: format!(
                "Never pushed to any remote: {}",
                state.never_pushed_branches.join(", ")
            ),
            severity: Severity::Danger,
        });
    }
    if state.is_detached_head {
        out.push(Blocker {
            message: "HEAD is detached (commits made here belong to no branch)".to_string(),
            severity: Severity::Danger,
        });
    }
    out
}

/// One human-readable blocker per violated condition; empty iff the state is clean.
pub fn evaluate_safety_checks(state: &GitState) -> Vec<String> {
    blockers_for(state).into_iter().map(|b| b.message).collect()
}

pub fn build_safety_report(state: &GitState) -> SafetyReport {
    let blockers = blockers_for(state);
    let mut suggestions = Vec::new();
    if state.has_staged || state.has_unstaged || state.has_untracked {
        suggestions.push("Commit or discard your changes (git add -A && git commit)".to_string());
    }
    if state.stash_count > 0 {
        suggestions.push("Pop or drop the stash (git stash pop)".to_string());
    }
    if !state.unpushed_branches.is_empty() {
        suggestions.push("Push your commits (git push)".to_string());
    }
    if !state.never_pushed_branches.is_empty() {
        suggestions.push("Push new branches with an upstream (git push -u origin <branch>)".to_string());
    }
    if state.is_detached_head {
        suggestions.push("Create a branch for detached work (git switch -c <name>)".to_string());
    }
    SafetyReport {
        blockers,
        suggestions,
        force_hint: "Use --force to remove anyway; forced removals are recorded in the audit log."
            .to_string(),
    }
}

impl SafetyReport {
    pub fn is_clean(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn has_danger(&self) -> bool {
        self.blockers.iter().any(|b| b.severity == Severity::Danger)
    }

    /// Multi-line display text (no trailing newline).
    pub fn render(&self, use_color: bool) -> String {
        let mut lines = Vec::new();
        for b in &self.blockers {
            let tag = match b.severity {
                Severity::Warning => paint(use_color, "\x1b[33m", "warning"),
                Severity::Danger => paint(use_color, "\x1b[31;1m", "danger"),
            };
            lines.push(format!("  [{tag}] {}", b.message));
        }
        if !self.suggestions.is_empty() {
            lines.push(String::new());
            lines.push("To resolve:".to_string());
            for s in &self.suggestions {
                lines.push(format!("  - {s}"));
            }
        }
        lines.push(String::new());
        lines.push(paint(use_color, "\x1b[2m", &self.force_hint));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_clean_state_has_no_blockers() {
        assert!(evaluate_safety_checks(&GitState::default()).is_empty());
    }

    #[test]
    fn test_pluralization_follows_counts() {
        let one = GitState {
            has_staged: true,
            staged_count: 1,
            has_untracked: true,
            untracked_count: 1,
            ..GitState::default()
        };
        assert_eq!(
            evaluate_safety_checks(&one),
            vec!["1 file with staged changes", "1 untracked file"]
        );
        let many = GitState {
            has_unstaged: true,
            unstaged_count: 3,
            has_untracked: true,
            untracked_count: 2,
            ..GitState::default()
        };
        assert_eq!(
            evaluate_safety_checks(&many),
            vec!["3 files with unstaged changes", "2 untracked files"]
        );
    }

    #[test]
    fn test_exactly_one_stash_entry_mentions_count() {
        for n in [1usize, 2, 7] {
            let st = GitState {
                stash_count: n,
                first_stash_message: Some("WIP on main".into()),
                ..GitState::default()
            };
            let blockers = evaluate_safety_checks(&st);
            let stash: Vec<_> = blockers.iter().filter(|b| b.contains("stash")).collect();
            assert_eq!(stash.len(), 1, "{blockers:?}");
            assert!(stash[0].contains(&n.to_string()));
        }
        let one = GitState {
            stash_count: 1,
            ..GitState::default()
        };
        assert_eq!(evaluate_safety_checks(&one), vec!["1 stash"]);
    }

    #[test]
    fn test_branches_and_detached_head() {
        let mut counts = BTreeMap::new();
        counts.insert("main".to_string(), 2);
        counts.insert("dev".to_string(), 1);
        let st = GitState {
            unpushed_branches: vec!["main".into(), "dev".into()],
            unpushed_commit_counts: counts,
            never_pushed_branches: vec!["feature".into(), "spike".into()],
            is_detached_head: true,
            ..GitState::default()
        };
        let report = build_safety_report(&st);
        let msgs: Vec<&str> = report.blockers.iter().map(|b| b.message.as_str()).collect();
        assert_eq!(msgs[0], "Unpushed commits on: main (2 commits), dev (1 commit)");
        assert_eq!(msgs[1], "Never pushed to any remote: feature, spike");
        assert!(msgs[2].starts_with("HEAD is detached"));
        assert_eq!(report.blockers[0].severity, Severity::Warning);
        assert_eq!(report.blockers[1].severity, Severity::Danger);
        assert_eq!(report.blockers[2].severity, Severity::Danger);
        assert!(report.has_danger());
        assert_eq!(report.suggestions.len(), 3);
    }

    #[test]
    fn test_render_includes_suggestions_and_force_hint() {
        let st = GitState {
            has_staged: true,
            staged_count: 2,
            ..GitState::default()
        };
        let text = build_safety_report(&st).render(false);
        assert!(text.contains("[warning] 2 files with staged changes"), "{text}");
        assert!(text.contains("Commit or discard"), "{text}");
        assert!(text.contains("--force"), "{text}");
    }
}
