// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! High-level worktree management over a detected VCS.
//!
//! Picks the right adapter for a repository (Jujutsu if a `.jj` marker
//! directory exists, else Git if `.git` exists, else none) and memoizes that
//! choice for the manager's lifetime. Worktree names are deterministic in
//! (project, issue), so the same pair always maps to the same working copy.
//!
//! When no VCS is detected, every operation degrades: creation returns
//! `None`, listings are empty, merges report failure. Callers fall back to
//! non-isolated execution.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{error, info, warn};

use crate::vcs::{
    GitAdapter, JujutsuAdapter, MergeResult, MergeStrategy, VcsAdapter, VcsKind, WorktreeInfo,
};

/// Options for creating an isolated worktree.
#[derive(Debug, Clone)]
pub struct CreateWorktreeOptions {
    pub project_id: String,
    pub issue_id: String,
    /// Branch to base the worktree on (default: the repo's default branch).
    pub base_branch: Option<String>,
}

/// Options for merging a worktree back.
#[derive(Debug, Clone)]
pub struct MergeWorktreeOptions {
    /// Target branch (default: the repo's default branch).
    pub target_branch: Option<String>,
    pub strategy: MergeStrategy,
    /// Remove the worktree after a successful merge.
    pub cleanup: bool,
}

impl Default for MergeWorktreeOptions {
    fn default() -> Self {
        Self {
            target_branch: None,
            strategy: MergeStrategy::default(),
            cleanup: true,
        }
    }
}

/// Derive the deterministic worktree name for a (project, issue) pair.
///
/// Everything outside `[A-Za-z0-9/-]` becomes a dash, keeping the result
/// safe for both directory and branch names.
pub fn worktree_name(project_id: &str, issue_id: &str) -> String {
    sanitize_name(&format!("{project_id}/{issue_id}"))
}

fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '/' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Manages isolated worktrees for a repository.
pub struct WorktreeManager {
    repo_root: PathBuf,
    base_override: Option<PathBuf>,
    adapter: OnceLock<Option<Arc<dyn VcsAdapter>>>,
}

impl WorktreeManager {
    /// Create a manager for the repository at `repo_root`.
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            base_override: None,
            adapter: OnceLock::new(),
        }
    }

    /// Override the base directory where worktrees are created.
    pub fn with_base_path(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    /// Detect the VCS and return the adapter. The choice is memoized.
    pub fn adapter(&self) -> Option<Arc<dyn VcsAdapter>> {
        self.adapter
            .get_or_init(|| {
                // jj colocated repos carry both markers; prefer jj
                if self.repo_root.join(".jj").exists() {
                    info!("Detected Jujutsu (jj) repository at {:?}", self.repo_root);
                    let adapter = JujutsuAdapter::new(&self.repo_root);
                    let adapter = match &self.base_override {
                        Some(base) => adapter.with_worktree_base(base.clone()),
                        None => adapter,
                    };
                    return Some(Arc::new(adapter) as Arc<dyn VcsAdapter>);
                }

                if self.repo_root.join(".git").exists() {
                    info!("Detected Git repository at {:?}", self.repo_root);
                    let adapter = GitAdapter::new(&self.repo_root);
                    let adapter = match &self.base_override {
                        Some(base) => adapter.with_worktree_base(base.clone()),
                        None => adapter,
                    };
                    return Some(Arc::new(adapter) as Arc<dyn VcsAdapter>);
                }

                warn!("No VCS detected in {:?}", self.repo_root);
                None
            })
            .clone()
    }

    /// The detected VCS kind, if any.
    pub fn vcs_kind(&self) -> Option<VcsKind> {
        self.adapter().map(|a| a.kind())
    }

    /// Create an isolated worktree for working on an issue.
    ///
    /// Returns `None` when no VCS is detected or the adapter fails; the
    /// error is logged, not surfaced.
    pub async fn create_isolated_worktree(
        &self,
        options: &CreateWorktreeOptions,
    ) -> Option<WorktreeInfo> {
        let adapter = self.adapter()?;

        let name = worktree_name(&options.project_id, &options.issue_id);

        match adapter
            .create_worktree(&name, options.base_branch.as_deref())
            .await
        {
            Ok(info) => {
                info!(
                    "Created worktree for {} at {:?}",
                    options.issue_id, info.path
                );
                Some(info)
            }
            Err(e) => {
                error!("Failed to create worktree: {}", e);
                None
            }
        }
    }

    /// List all worktrees belonging to a project.
    pub async fn list_project_worktrees(&self, project_id: &str) -> Vec<WorktreeInfo> {
        let Some(adapter) = self.adapter() else {
            return Vec::new();
        };

        let prefix = format!("{project_id}/");
        adapter
            .list_worktrees()
            .await
            .into_iter()
            .filter(|wt| wt.name.starts_with(&prefix))
            .collect()
    }

    /// List every worktree known to the VCS.
    pub async fn list_all_worktrees(&self) -> Vec<WorktreeInfo> {
        match self.adapter() {
            Some(adapter) => adapter.list_worktrees().await,
            None => Vec::new(),
        }
    }

    /// Get the worktree for a specific (project, issue) pair.
    pub async fn get_worktree(&self, project_id: &str, issue_id: &str) -> Option<WorktreeInfo> {
        let name = worktree_name(project_id, issue_id);
        self.list_project_worktrees(project_id)
            .await
            .into_iter()
            .find(|wt| wt.name == name)
    }

    /// Merge a worktree back to the target branch and optionally clean up.
    ///
    /// Cleanup runs only after a successful merge; a failed removal is
    /// logged but does not change the reported merge result.
    pub async fn merge_and_cleanup(
        &self,
        worktree_name: &str,
        options: MergeWorktreeOptions,
    ) -> MergeResult {
        let Some(adapter) = self.adapter() else {
            return MergeResult::failed("No VCS detected");
        };

        let worktrees = adapter.list_worktrees().await;
        let Some(worktree) = worktrees.iter().find(|wt| wt.name == worktree_name) else {
            return MergeResult::failed(format!("Worktree '{worktree_name}' not found"));
        };

        let source = worktree
            .branch
            .clone()
            .unwrap_or_else(|| worktree_name.to_string());

        let result = adapter
            .merge(&source, options.target_branch.as_deref(), options.strategy)
            .await;

        if !result.success {
            return result;
        }

        if options.cleanup && !adapter.remove_worktree(worktree_name).await {
            warn!("Failed to remove worktree after merge: {}", worktree_name);
        }

        result
    }

    /// Remove a worktree without merging.
    pub async fn remove_worktree(&self, worktree_name: &str) -> bool {
        match self.adapter() {
            Some(adapter) => adapter.remove_worktree(worktree_name).await,
            None => false,
        }
    }

    /// Whether the main working copy has uncommitted changes.
    pub async fn has_uncommitted_changes(&self) -> bool {
        match self.adapter() {
            Some(adapter) => adapter.has_uncommitted_changes().await,
            None => false,
        }
    }

    /// Current branch/change of the main working copy.
    pub async fn current_branch(&self) -> Option<String> {
        match self.adapter() {
            Some(adapter) => Some(adapter.current_branch().await),
            None => None,
        }
    }

    /// Detected default branch.
    pub async fn default_branch(&self) -> Option<String> {
        match self.adapter() {
            Some(adapter) => Some(adapter.default_branch().await),
            None => None,
        }
    }

    /// VCS-specific cheat sheet for prompt injection.
    ///
    /// A static block per VCS kind; not derived from live repository state.
    pub fn vcs_context(&self) -> Option<&'static str> {
        match self.vcs_kind()? {
            VcsKind::Jj => Some(JJ_CONTEXT),
            VcsKind::Git => Some(GIT_CONTEXT),
        }
    }
}

const JJ_CONTEXT: &str = "<vcs-context>
This repository uses **Jujutsu (jj)** for version control.
Use `jj` commands for all VCS operations:
- `jj status` - Show working copy status
- `jj diff` - Show changes
- `jj commit -m \"message\"` - Create a commit
- `jj new` - Start a new change
- `jj squash` - Squash changes
- `jj bookmark set <name>` - Create/update a bookmark
</vcs-context>";

const GIT_CONTEXT: &str = "<vcs-context>
This repository uses **Git** for version control.
Use `git` commands for all VCS operations:
- `git status` - Show working tree status
- `git diff` - Show changes
- `git add . && git commit -m \"message\"` - Stage and commit
- `git checkout -b <branch>` - Create a new branch
- `git merge <branch>` - Merge a branch
</vcs-context>";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_worktree_name_deterministic() {
        assert_eq!(worktree_name("proj", "issue-1"), "proj/issue-1");
        assert_eq!(
            worktree_name("proj", "issue-1"),
            worktree_name("proj", "issue-1")
        );
    }

    #[test]
    fn test_worktree_name_sanitizes() {
        assert_eq!(worktree_name("my proj", "issue #1"), "my-proj/issue--1");
        assert_eq!(worktree_name("a.b", "c_d"), "a-b/c-d");
    }

    #[test]
    fn test_detect_git() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();

        let manager = WorktreeManager::new(dir.path());
        assert_eq!(manager.vcs_kind(), Some(VcsKind::Git));
    }

    #[test]
    fn test_detect_jj_preferred_over_git() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join(".jj")).unwrap();

        let manager = WorktreeManager::new(dir.path());
        assert_eq!(manager.vcs_kind(), Some(VcsKind::Jj));
    }

    #[test]
    fn test_detect_none() {
        let dir = tempdir().unwrap();
        let manager = WorktreeManager::new(dir.path());
        assert_eq!(manager.vcs_kind(), None);
        assert!(manager.vcs_context().is_none());
    }

    #[test]
    fn test_detection_memoized() {
        let dir = tempdir().unwrap();
        let manager = WorktreeManager::new(dir.path());
        assert_eq!(manager.vcs_kind(), None);

        // Adding a marker after first detection does not change the choice
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        assert_eq!(manager.vcs_kind(), None);
    }

    #[test]
    fn test_vcs_context_blocks() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".jj")).unwrap();

        let manager = WorktreeManager::new(dir.path());
        let context = manager.vcs_context().unwrap();
        assert!(context.contains("Jujutsu"));
        assert!(context.contains("jj status"));
    }

    #[tokio::test]
    async fn test_no_vcs_operations_degrade() {
        let dir = tempdir().unwrap();
        let manager = WorktreeManager::new(dir.path());

        let created = manager
            .create_isolated_worktree(&CreateWorktreeOptions {
                project_id: "proj".to_string(),
                issue_id: "issue-1".to_string(),
                base_branch: None,
            })
            .await;
        assert!(created.is_none());

        assert!(manager.list_project_worktrees("proj").await.is_empty());
        assert!(!manager.remove_worktree("proj/issue-1").await);

        let merged = manager
            .merge_and_cleanup("proj/issue-1", MergeWorktreeOptions::default())
            .await;
        assert!(!merged.success);
        assert_eq!(merged.error.as_deref(), Some("No VCS detected"));
    }
}
