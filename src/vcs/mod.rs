// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Version-control adapters for worktree isolation.
//!
//! One capability contract over two incompatible CLIs:
//!
//! - **Git**: isolation via `git worktree`, one branch per worktree, in a
//!   sibling `<repo>-worktrees/` directory.
//! - **Jujutsu**: isolation via `jj workspace`, "branch" represented by the
//!   workspace's current change id, in a sibling `<repo>-workspaces/`
//!   directory.
//!
//! Adapters shell out with argument vectors and never raise on a non-zero
//! exit: read probes fall back to safe defaults, removals report `false`,
//! and merges return a [`MergeResult`] that carries conflict details. Only
//! worktree *creation* surfaces a typed [`VcsError`], because callers need
//! the underlying stderr to report why isolation is unavailable.

mod git;
mod jujutsu;
pub mod shell;

pub use git::GitAdapter;
pub use jujutsu::JujutsuAdapter;
pub use shell::CommandOutput;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Supported version control systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Jj,
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VcsKind::Git => write!(f, "git"),
            VcsKind::Jj => write!(f, "jj"),
        }
    }
}

/// Strategy for folding isolated changes back into a target branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Flatten all changes into one commit on the target.
    #[default]
    Squash,
    /// Preserve history with a merge commit.
    Merge,
    /// Replay commits onto the target.
    Rebase,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::Squash => write!(f, "squash"),
            MergeStrategy::Merge => write!(f, "merge"),
            MergeStrategy::Rebase => write!(f, "rebase"),
        }
    }
}

/// Description of an isolated working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeInfo {
    /// Worktree name (used in path and branch naming).
    pub name: String,
    /// Filesystem path of the working copy.
    pub path: PathBuf,
    /// Git branch or jj change id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Whether this is the main/default working copy.
    pub is_main: bool,
}

/// Result of a merge operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub success: bool,
    /// Resulting commit/change id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Paths that conflicted, when the VCS can enumerate them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_files: Vec<String>,
}

impl MergeResult {
    /// A successful merge producing the given commit/change id.
    pub fn ok(commit_id: impl Into<String>) -> Self {
        Self {
            success: true,
            commit_id: Some(commit_id.into()),
            error: None,
            conflict_files: Vec::new(),
        }
    }

    /// A failed merge with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            commit_id: None,
            error: Some(error.into()),
            conflict_files: Vec::new(),
        }
    }

    /// A failed merge due to conflicts.
    pub fn conflicted(conflict_files: Vec<String>) -> Self {
        Self {
            success: false,
            commit_id: None,
            error: Some("Merge conflicts detected".to_string()),
            conflict_files,
        }
    }

    /// Whether this failure was a conflict.
    pub fn is_conflict(&self) -> bool {
        !self.success && self.error.as_deref() == Some("Merge conflicts detected")
    }
}

/// Error type for VCS operations that must surface a cause.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("{kind} command failed: {stderr}")]
    CommandFailed { kind: VcsKind, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform operations over an isolated-working-copy capable VCS.
#[async_trait]
pub trait VcsAdapter: Send + Sync {
    /// The VCS this adapter handles.
    fn kind(&self) -> VcsKind;

    /// Root directory of the repository.
    fn repo_root(&self) -> &Path;

    /// Base directory where isolated working copies are created.
    fn worktree_base(&self) -> &Path;

    /// Create a new isolated working copy.
    ///
    /// `base_branch` defaults to the repository's default branch.
    async fn create_worktree(
        &self,
        name: &str,
        base_branch: Option<&str>,
    ) -> Result<WorktreeInfo, VcsError>;

    /// Enumerate all worktrees/workspaces known to the VCS.
    ///
    /// The main working copy is tagged `is_main`. Returns an empty list when
    /// the underlying command fails.
    async fn list_worktrees(&self) -> Vec<WorktreeInfo>;

    /// Remove a worktree/workspace. Returns `false` on failure so callers
    /// can decide whether to retry or warn.
    async fn remove_worktree(&self, name: &str) -> bool;

    /// Fold changes from `source` into `target` (default branch when
    /// `None`) using the given strategy.
    async fn merge(
        &self,
        source: &str,
        target: Option<&str>,
        strategy: MergeStrategy,
    ) -> MergeResult;

    /// Current branch name or change id. Read-only.
    async fn current_branch(&self) -> String;

    /// Detected default branch. Read-only.
    async fn default_branch(&self) -> String;

    /// Whether the working copy has pending modifications. Read-only.
    async fn has_uncommitted_changes(&self) -> bool;
}

/// Compute the sibling directory where isolated working copies live.
pub(crate) fn sibling_base(repo_root: &Path, suffix: &str) -> PathBuf {
    let repo_name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());

    repo_root
        .parent()
        .unwrap_or(repo_root)
        .join(format!("{repo_name}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_kind_serde() {
        assert_eq!(serde_json::to_string(&VcsKind::Git).unwrap(), "\"git\"");
        assert_eq!(serde_json::to_string(&VcsKind::Jj).unwrap(), "\"jj\"");

        let parsed: VcsKind = serde_json::from_str("\"jj\"").unwrap();
        assert_eq!(parsed, VcsKind::Jj);
    }

    #[test]
    fn test_merge_strategy_default() {
        assert_eq!(MergeStrategy::default(), MergeStrategy::Squash);
    }

    #[test]
    fn test_merge_result_constructors() {
        let ok = MergeResult::ok("abc123");
        assert!(ok.success);
        assert_eq!(ok.commit_id.as_deref(), Some("abc123"));

        let conflicted = MergeResult::conflicted(vec!["src/lib.rs".to_string()]);
        assert!(!conflicted.success);
        assert!(conflicted.is_conflict());
        assert_eq!(conflicted.conflict_files, vec!["src/lib.rs"]);

        let failed = MergeResult::failed("checkout failed");
        assert!(!failed.is_conflict());
    }

    #[test]
    fn test_sibling_base() {
        let base = sibling_base(Path::new("/work/project"), "-worktrees");
        assert_eq!(base, PathBuf::from("/work/project-worktrees"));

        let base = sibling_base(Path::new("/work/project"), "-workspaces");
        assert_eq!(base, PathBuf::from("/work/project-workspaces"));
    }

    #[test]
    fn test_worktree_info_serde_camel_case() {
        let info = WorktreeInfo {
            name: "proj/issue-1".to_string(),
            path: PathBuf::from("/work/project-worktrees/proj/issue-1"),
            branch: Some("proj-issue-1".to_string()),
            is_main: false,
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"isMain\":false"));
    }
}
