//! Structured dirtiness report for a workspace's git repository.
//!
//! The report is assembled from four independent read-only queries (status,
//! stash list, branch upstream tracking, HEAD symbolic-ref). This module only
//! parses their output; running them lives in [`crate::git`].
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitState {
    pub has_staged: bool,
    pub staged_count: usize,
    pub has_unstaged: bool,
    pub unstaged_count: usize,
    pub has_untracked: bool,
    pub untracked_count: usize,
    pub stash_count: usize,
    pub first_stash_message: Option<String>,
    pub unpushed_branches: Vec<String>,
    pub unpushed_commit_counts: BTreeMap<String, u32>,
    pub never_pushed_branches: Vec<String>,
    pub is_detached_head: bool,
}

impl GitState {
    /// Derived from the other fields; never stored on its own.
    pub fn is_clean(&self) -> bool {
        !self.has_staged
            && !self.has_unstaged
            && !self.has_untracked
            && self.stash_count == 0
            && self.unpushed_branches.is_empty()
            && self.never_pushed_branches.is_empty()
            && !self.is_detached_head
    }

    /// Combine the four query results into one report.
    pub fn from_parts(
        status: StatusCounts,
        stash: StashSummary,
        branches: BranchTracking,
        is_detached_head: bool,
    ) -> Self {
        GitState {
            has_staged: status.staged > 0,
            staged_count: status.staged,
            has_unstaged: status.unstaged > 0,
            unstaged_count: status.unstaged,
            has_untracked: status.untracked > 0,
            untracked_count: status.untracked,
            stash_count: stash.count,
            first_stash_message: stash.first_message,
            unpushed_branches: branches.unpushed,
            unpushed_commit_counts: branches.unpushed_counts,
            never_pushed_branches: branches.never_pushed,
            is_detached_head,
        }
    }
}

impl Serialize for GitState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("GitState", 13)?;
        s.serialize_field("hasStaged", &self.has_staged)?;
        s.serialize_field("stagedCount", &self.staged_count)?;
        s.serialize_field("hasUnstaged", &self.has_unstaged)?;
        s.serialize_field("unstagedCount", &self.unstaged_count)?;
        s.serialize_field("hasUntracked", &self.has_untracked)?;
        s.serialize_field("untrackedCount", &self.untracked_count)?;
        s.serialize_field("stashCount", &self.stash_count)?;
        s.serialize_field("firstStashMessage", &self.first_stash_message)?;
        s.serialize_field("unpushedBranches", &self.unpushed_branches)?;
        s.serialize_field("unpushedCommitCounts", &self.unpushed_commit_counts)?;
        s.serialize_field("neverPushedBranches", &self.never_pushed_branches)?;
        s.serialize_field("isDetachedHead", &self.is_detached_head)?;
        s.serialize_field("isClean", &self.is_clean())?;
        s.end()
    }
}

/// Failure of the working-tree status query, the one query that cannot degrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitStateError {
    pub message: String,
}

impl fmt::Display for GitStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git status failed: {}", self.message)
    }
}

impl std::error::Error for GitStateError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
}

/// Parse `git status --porcelain=v1` output.
///
/// Index column in `M A D R C` counts as staged, any non-blank work-tree
/// column as unstaged, `??` as untracked; `!!` lines are skipped entirely.
pub fn parse_status(output: &str) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for line in output.lines() {
        let mut cols = line.chars();
        let (x, y) = match (cols.next(), cols.next()) {
            (Some(x), Some(y)) => (x, y),
            _ => continue,
        };
        match (x, y) {
            ('!', '!') => continue,
            ('?', '?') => {
                counts.untracked += 1;
                continue;
            }
            _ => {}
        }
        if matches!(x, 'M' | 'A' | 'D' | 'R' | 'C') {
            counts.staged += 1;
        }
        if y != ' ' {
            counts.unstaged += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashSummary {
    pub count: usize,
    pub first_message: Option<String>,
}

/// Parse `git stash list`: one stash per line, message after the first `": "`.
pub fn parse_stash_list(output: &str) -> StashSummary {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let first_message = lines.first().map(|l| match l.split_once(": ") {
        Some((_, msg)) => msg.trim().to_string(),
        None => l.trim().to_string(),
    });
    StashSummary {
        count: lines.len(),
        first_message,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTracking {
    pub unpushed: Vec<String>,
    pub unpushed_counts: BTreeMap<String, u32>,
    pub never_pushed: Vec<String>,
}

/// Parse `<branch> <upstream> <track>` lines from
/// `git for-each-ref --format='%(refname:short) %(upstream:short) %(upstream:track)'`.
///
/// A bare branch name has no upstream (never pushed). An `[ahead N]` marker
/// makes it unpushed with count N. Anything else (in sync, behind only, gone)
/// contributes to neither list.
pub fn parse_branch_tracking(output: &str) -> BranchTracking {
    let mut out = BranchTracking::default();
    for line in output.lines() {
        let mut words = line.split_whitespace();
        let branch = match words.next() {
            Some(b) => b,
            None => continue,
        };
        if words.next().is_none() {
            out.never_pushed.push(branch.to_string());
            continue;
        }
        let track = words.collect::<Vec<_>>().join(" ");
        if let Some(ahead) = parse_ahead(&track) {
            if ahead > 0 {
                out.unpushed.push(branch.to_string());
                out.unpushed_counts.insert(branch.to_string(), ahead);
            }
        }
    }
    out
}

fn parse_ahead(track: &str) -> Option<u32> {
    let inner = track.trim().strip_prefix('[')?.strip_suffix(']')?;
    inner.split(',').find_map(|part| {
        part.trim()
            .strip_prefix("ahead ")
            .and_then(|n| n.trim().parse::<u32>().ok())
    })
}
