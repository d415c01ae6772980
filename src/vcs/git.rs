// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Git implementation of [`VcsAdapter`].
//!
//! Isolation uses `git worktree`: each working copy gets its own branch
//! (slashes in the worktree name become dashes) under a sibling
//! `<repo>-worktrees/` directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::shell::{run, CommandOutput};
use super::{sibling_base, MergeResult, MergeStrategy, VcsAdapter, VcsError, VcsKind, WorktreeInfo};

/// Git adapter rooted at a repository.
pub struct GitAdapter {
    repo_root: PathBuf,
    worktree_base: PathBuf,
}

impl GitAdapter {
    /// Create an adapter for the repository at `repo_root`.
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        let repo_root = repo_root.as_ref().to_path_buf();
        let worktree_base = sibling_base(&repo_root, "-worktrees");
        Self {
            repo_root,
            worktree_base,
        }
    }

    /// Create an adapter with a custom worktree base directory.
    pub fn with_worktree_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.worktree_base = base.into();
        self
    }

    async fn git(&self, args: &[&str]) -> CommandOutput {
        run("git", args, &self.repo_root).await
    }

    /// Branch name derived from a worktree name.
    fn branch_for(name: &str) -> String {
        name.replace('/', "-")
    }
}

/// One group of lines from `git worktree list --porcelain`.
#[derive(Debug, Default, Clone)]
struct PorcelainEntry {
    path: PathBuf,
    branch: Option<String>,
}

/// Parse `git worktree list --porcelain` output.
///
/// Entries are newline-separated groups of `worktree <path>`, optional
/// `branch refs/heads/<name>`, and flag lines (`bare`, `detached`).
fn parse_porcelain(stdout: &str) -> Vec<PorcelainEntry> {
    let mut entries = Vec::new();
    let mut current = PorcelainEntry::default();

    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if !current.path.as_os_str().is_empty() {
                entries.push(std::mem::take(&mut current));
            }
            current.path = PathBuf::from(path);
        } else if let Some(branch) = line.strip_prefix("branch ") {
            current.branch = Some(branch.trim_start_matches("refs/heads/").to_string());
        }
    }

    if !current.path.as_os_str().is_empty() {
        entries.push(current);
    }

    entries
}

/// Derive the worktree name for an entry path.
fn name_for_path(path: &Path, worktree_base: &Path) -> String {
    match path.strip_prefix(worktree_base) {
        Ok(relative) => relative.to_string_lossy().to_string(),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl VcsAdapter for GitAdapter {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn worktree_base(&self) -> &Path {
        &self.worktree_base
    }

    async fn create_worktree(
        &self,
        name: &str,
        base_branch: Option<&str>,
    ) -> Result<WorktreeInfo, VcsError> {
        let worktree_path = self.worktree_base.join(name);
        let branch = Self::branch_for(name);

        info!("Creating git worktree: {} at {:?}", name, worktree_path);

        let base = match base_branch {
            Some(base) => base.to_string(),
            None => self.default_branch().await,
        };

        if let Some(parent) = worktree_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path_str = worktree_path.to_string_lossy().to_string();
        let output = self
            .git(&["worktree", "add", "-b", &branch, &path_str, &base])
            .await;

        if !output.success() {
            error!("Failed to create worktree: {}", output.stderr);
            return Err(VcsError::CommandFailed {
                kind: VcsKind::Git,
                stderr: output.stderr,
            });
        }

        Ok(WorktreeInfo {
            name: name.to_string(),
            path: worktree_path,
            branch: Some(branch),
            is_main: false,
        })
    }

    async fn list_worktrees(&self) -> Vec<WorktreeInfo> {
        let output = self.git(&["worktree", "list", "--porcelain"]).await;
        if !output.success() {
            return Vec::new();
        }

        parse_porcelain(&output.stdout)
            .into_iter()
            .map(|entry| WorktreeInfo {
                name: name_for_path(&entry.path, &self.worktree_base),
                is_main: entry.path == self.repo_root,
                path: entry.path,
                branch: entry.branch,
            })
            .collect()
    }

    async fn remove_worktree(&self, name: &str) -> bool {
        let worktree_path = self.worktree_base.join(name);
        let path_str = worktree_path.to_string_lossy().to_string();

        info!("Removing git worktree: {}", name);

        let output = self
            .git(&["worktree", "remove", &path_str, "--force"])
            .await;
        if !output.success() {
            warn!("Failed to remove worktree: {}", output.stderr);
            return false;
        }

        // Branch may not exist; deletion failure is tolerated
        let branch = Self::branch_for(name);
        self.git(&["branch", "-D", &branch]).await;

        true
    }

    async fn merge(
        &self,
        source: &str,
        target: Option<&str>,
        strategy: MergeStrategy,
    ) -> MergeResult {
        let target = match target {
            Some(target) => target.to_string(),
            None => self.default_branch().await,
        };

        info!("Merging {} into {} with strategy: {}", source, target, strategy);

        let checkout = self.git(&["checkout", &target]).await;
        if !checkout.success() {
            return MergeResult::failed(format!(
                "Failed to checkout {}: {}",
                target, checkout.stderr
            ));
        }

        let merge = match strategy {
            MergeStrategy::Squash => self.git(&["merge", "--squash", source]).await,
            MergeStrategy::Rebase => self.git(&["rebase", source]).await,
            MergeStrategy::Merge => self.git(&["merge", source]).await,
        };

        if !merge.success() {
            let combined = format!("{}\n{}", merge.stdout, merge.stderr);
            if combined.contains("CONFLICT") || combined.contains("conflict") {
                let conflicts = self.git(&["diff", "--name-only", "--diff-filter=U"]).await;
                let files = conflicts
                    .stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                return MergeResult::conflicted(files);
            }

            return MergeResult::failed(format!("Merge failed: {}", merge.stderr));
        }

        // Squash leaves staged changes that still need a commit
        if strategy == MergeStrategy::Squash {
            let message = format!("Merge {source} (squashed)");
            let commit = self.git(&["commit", "-m", &message]).await;
            if !commit.success() && !commit.stdout.contains("nothing to commit") {
                return MergeResult::failed(format!("Commit failed: {}", commit.stderr));
            }
        }

        let head = self.git(&["rev-parse", "HEAD"]).await;
        MergeResult::ok(head.stdout_trimmed())
    }

    async fn current_branch(&self) -> String {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await;
        if !output.success() {
            return "HEAD".to_string();
        }
        output.stdout_trimmed().to_string()
    }

    async fn default_branch(&self) -> String {
        let output = self
            .git(&["symbolic-ref", "refs/remotes/origin/HEAD"])
            .await;
        if output.success() {
            return output
                .stdout_trimmed()
                .trim_start_matches("refs/remotes/origin/")
                .to_string();
        }

        for branch in ["main", "master", "trunk"] {
            let check = self.git(&["rev-parse", "--verify", branch]).await;
            if check.success() {
                return branch.to_string();
            }
        }

        "main".to_string()
    }

    async fn has_uncommitted_changes(&self) -> bool {
        let output = self.git(&["status", "--porcelain"]).await;
        !output.stdout_trimmed().is_empty()
    }
}
