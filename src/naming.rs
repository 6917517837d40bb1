//! Workspace identity and on-disk layout.
//!
//! Everything here is a pure function of a repository URL, an instance name
//! and the configured base directory. A workspace is identified by
//! `<repoSlug>-<instance>`; nothing about it is cached.
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Longest repository slug kept verbatim; longer slugs are compressed so
/// container and host names derived from them stay within runtime limits.
pub const MAX_SLUG_LEN: usize = 39;

/// Prefix applied to every derived container name.
pub const CONTAINER_PREFIX: &str = "devbox-";

/// Hidden per-workspace directory holding state and the baseline config.
pub const METADATA_DIR_NAME: &str = ".devbox";

pub const STATE_FILE_NAME: &str = "state.json";

const HASH_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameError {
    message: String,
}

impl NameError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NameError {}

/// Derived filesystem layout of one workspace. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath {
    pub root: PathBuf,
    pub name: String,
    pub metadata_dir: PathBuf,
    pub state_file: PathBuf,
}

impl WorkspacePath {
    pub fn new(base_dir: &Path, name: &str) -> Self {
        let root = workspaces_dir(base_dir).join(name);
        let metadata_dir = root.join(METADATA_DIR_NAME);
        let state_file = metadata_dir.join(STATE_FILE_NAME);
        Self {
            root,
            name: name.to_string(),
            metadata_dir,
            state_file,
        }
    }

    pub fn default_container_name(&self) -> String {
        derive_container_name(&self.name)
    }
}

/// `<base>/workspaces`
pub fn workspaces_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("workspaces")
}

/// Check one name segment against `^[A-Za-z0-9][A-Za-z0-9._-]*$`.
pub fn validate_name_segment(what: &str, value: &str) -> Result<(), NameError> {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(NameError::new(format!("{what} must not be empty"))),
    };
    if !first.is_ascii_alphanumeric() {
        return Err(NameError::new(format!(
            "invalid {what} '{value}': must start with a letter or digit"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-'))) {
        let shown = if bad.is_whitespace() {
            "whitespace".to_string()
        } else {
            format!("'{bad}'")
        };
        return Err(NameError::new(format!(
            "invalid {what} '{value}': {shown} is not allowed (use letters, digits, '.', '_' or '-')"
        )));
    }
    if value.contains("..") {
        return Err(NameError::new(format!(
            "invalid {what} '{value}': '..' is not allowed"
        )));
    }
    Ok(())
}

/// `<repoSlug>-<instance>` after validating both segments.
pub fn derive_workspace_name(repo_slug: &str, instance: &str) -> Result<String, NameError> {
    validate_name_segment("repository slug", repo_slug)?;
    validate_name_segment("instance name", instance)?;
    Ok(format!("{repo_slug}-{instance}"))
}

/// Final path segment of an HTTPS or SSH repository URL, lowercased.
///
/// Trailing slashes and a trailing `.git` are ignored. Slugs longer than
/// [`MAX_SLUG_LEN`] are compressed with [`compress_slug`].
pub fn derive_repo_slug(url: &str) -> Result<String, NameError> {
    let mut s = url.trim().trim_end_matches('/');
    let has_git_suffix = s
        .len()
        .checked_sub(4)
        .and_then(|i| s.get(i..))
        .is_some_and(|tail| tail.eq_ignore_ascii_case(".git"));
    if has_git_suffix {
        s = s[..s.len() - 4].trim_end_matches('/');
    }
    let last = s.rsplit(['/', ':']).next().unwrap_or("").trim();
    if last.is_empty() {
        return Err(NameError::new(format!(
            "cannot derive a repository name from '{url}'"
        )));
    }
    let slug = last.to_ascii_lowercase();
    if slug.len() > MAX_SLUG_LEN {
        Ok(compress_slug(&slug, MAX_SLUG_LEN))
    } else {
        Ok(slug)
    }
}

/// Shorten `slug` to at most `max_len` bytes as `<prefix>-<hash6>-<suffix>`.
///
/// `hash6` is the first six hex digits of the SHA-256 of the full slug, so the
/// result is deterministic. Slugs already within `max_len` are returned as-is.
pub fn compress_slug(slug: &str, max_len: usize) -> String {
    if slug.len() <= max_len {
        return slug.to_string();
    }
    let hash = short_hash(slug);
    // Room for "<p>-<hash>-<s>" with at least one byte on each side.
    if max_len < HASH_LEN + 4 {
        return hash[..max_len.min(HASH_LEN)].to_string();
    }
    let budget = max_len - HASH_LEN - 2;
    let prefix_len = budget - budget / 2;
    let suffix_len = budget / 2;
    let prefix = take_prefix(slug, prefix_len).trim_end_matches(['-', '.', '_']);
    let suffix = take_suffix(slug, suffix_len).trim_start_matches(['-', '.', '_']);
    match (prefix.is_empty(), suffix.is_empty()) {
        (false, false) => format!("{prefix}-{hash}-{suffix}"),
        (false, true) => format!("{prefix}-{hash}"),
        (true, false) => format!("{hash}-{suffix}"),
        (true, true) => hash,
    }
}

/// Default container name for a workspace. The runtime may end up using a
/// different name when the repository's own config sets one.
pub fn derive_container_name(workspace_name: &str) -> String {
    format!("{CONTAINER_PREFIX}{workspace_name}")
}

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    let mut hex = String::with_capacity(HASH_LEN);
    for b in digest.iter().take(HASH_LEN / 2) {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}

fn take_prefix(s: &str, max_bytes: usize) -> &str {
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if i + c.len_utf8() > max_bytes {
            break;
        }
        end = i + c.len_utf8();
    }
    &s[..end]
}

fn take_suffix(s: &str, max_bytes: usize) -> &str {
    let mut start = s.len();
    for (i, _) in s.char_indices().rev() {
        if s.len() - i > max_bytes {
            break;
        }
        start = i;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_name_joins_segments() {
        assert_eq!(
            derive_workspace_name("my-repo", "feat_1").unwrap(),
            "my-repo-feat_1"
        );
    }

    #[test]
    fn test_workspace_name_rejects_unsafe_segments() {
        for bad in ["", ".hidden", "a/b", "..", "a..b", "has space", "tab\tx", "-lead", "ü"] {
            assert!(
                derive_workspace_name("repo", bad).is_err(),
                "instance {bad:?} should be rejected"
            );
            assert!(
                derive_workspace_name(bad, "dev").is_err(),
                "slug {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_repo_slug_from_common_url_forms() {
        let cases = [
            ("https://github.com/Acme/Widget.git", "widget"),
            ("https://github.com/acme/widget", "widget"),
            ("https://github.com/acme/widget/", "widget"),
            ("https://github.com/acme/widget.git/", "widget"),
            ("git@github.com:acme/Widget.git", "widget"),
            ("ssh://git@host:2222/team/widget.git", "widget"),
            ("git@host:widget", "widget"),
        ];
        for (url, want) in cases {
            assert_eq!(derive_repo_slug(url).unwrap(), want, "url {url}");
        }
    }

    #[test]
    fn test_repo_slug_empty_is_error() {
        assert!(derive_repo_slug("").is_err());
        assert!(derive_repo_slug("/").is_err());
        assert!(derive_repo_slug(".git").is_err());
    }

    #[test]
    fn test_long_repo_slug_is_compressed() {
        let url = "https://github.com/acme/an-extremely-long-repository-name-for-testing-purposes";
        let slug = derive_repo_slug(url).unwrap();
        assert!(slug.len() <= MAX_SLUG_LEN, "{slug}");
        assert!(slug.starts_with("an-extremely"), "{slug}");
        assert!(slug.ends_with("purposes"), "{slug}");
        assert!(validate_name_segment("slug", &slug).is_ok());
    }

    #[test]
    fn test_compress_slug_is_identity_under_cap() {
        assert_eq!(compress_slug("short", 39), "short");
        assert_eq!(compress_slug("", 39), "");
    }

    #[test]
    fn test_compress_slug_is_deterministic_and_bounded() {
        let inputs = [
            "a".repeat(100),
            "abc-def-ghi-jkl-mno-pqr-stu-vwx-yz0-123-456".to_string(),
            "x".repeat(40),
        ];
        for input in &inputs {
            for max in [0usize, 1, 5, 9, 10, 11, 20, 39] {
                let a = compress_slug(input, max);
                let b = compress_slug(input, max);
                assert_eq!(a, b);
                assert!(a.len() <= max, "{a:?} longer than {max}");
            }
        }
    }

    #[test]
    fn test_compress_slug_distinguishes_similar_inputs() {
        let a = compress_slug(&format!("{}-alpha-{}", "p".repeat(30), "s".repeat(30)), 39);
        let b = compress_slug(&format!("{}-bravo-{}", "p".repeat(30), "s".repeat(30)), 39);
        assert_ne!(a, b);
    }

    #[test]
    fn test_workspace_path_layout() {
        let ws = WorkspacePath::new(Path::new("/base"), "repo-dev");
        assert_eq!(ws.root, PathBuf::from("/base/workspaces/repo-dev"));
        assert_eq!(ws.metadata_dir, PathBuf::from("/base/workspaces/repo-dev/.devbox"));
        assert_eq!(
            ws.state_file,
            PathBuf::from("/base/workspaces/repo-dev/.devbox/state.json")
        );
        assert_eq!(ws.default_container_name(), "devbox-repo-dev");
    }
}
