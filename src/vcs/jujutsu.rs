// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Jujutsu (jj) implementation of [`VcsAdapter`].
//!
//! Isolation uses `jj workspace`: each working copy is a named workspace
//! under a sibling `<repo>-workspaces/` directory. There is no branch per
//! workspace; the workspace's current change id stands in for one.
//!
//! Conflict detection matches substrings in stderr; jj's conflict model
//! differs from git's and file-level enumeration is not attempted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use super::shell::{run, CommandOutput};
use super::{sibling_base, MergeResult, MergeStrategy, VcsAdapter, VcsError, VcsKind, WorktreeInfo};

/// `jj workspace list` line format: `name: path (change_id)`.
static WORKSPACE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+):\s+(.+?)(?:\s+\(([^)]+)\))?$").unwrap());

/// Jujutsu adapter rooted at a repository.
pub struct JujutsuAdapter {
    repo_root: PathBuf,
    worktree_base: PathBuf,
}

impl JujutsuAdapter {
    /// Create an adapter for the repository at `repo_root`.
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        let repo_root = repo_root.as_ref().to_path_buf();
        let worktree_base = sibling_base(&repo_root, "-workspaces");
        Self {
            repo_root,
            worktree_base,
        }
    }

    /// Create an adapter with a custom workspace base directory.
    pub fn with_worktree_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.worktree_base = base.into();
        self
    }

    async fn jj(&self, args: &[&str]) -> CommandOutput {
        run("jj", args, &self.repo_root).await
    }

    async fn jj_in(&self, dir: &Path, args: &[&str]) -> CommandOutput {
        run("jj", args, dir).await
    }
}

/// Parse one `jj workspace list` line into (name, path, change id).
fn parse_workspace_line(line: &str) -> Option<(String, String, Option<String>)> {
    let captures = WORKSPACE_LINE.captures(line.trim_end())?;
    Some((
        captures[1].to_string(),
        captures[2].to_string(),
        captures.get(3).map(|m| m.as_str().to_string()),
    ))
}

#[async_trait]
impl VcsAdapter for JujutsuAdapter {
    fn kind(&self) -> VcsKind {
        VcsKind::Jj
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
        _base_branch: Option<&str>,
    ) -> Result<WorktreeInfo, VcsError> {
        let workspace_path = self.worktree_base.join(name);

        info!("Creating jj workspace: {} at {:?}", name, workspace_path);

        // jj workspace add requires the parent directory to exist; names
        // like "project/issue" nest one level down
        if let Some(parent) = workspace_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path_str = workspace_path.to_string_lossy().to_string();
        let output = self
            .jj(&["workspace", "add", "--name", name, &path_str])
            .await;

        if !output.success() {
            error!("Failed to create workspace: {}", output.stderr);
            return Err(VcsError::CommandFailed {
                kind: VcsKind::Jj,
                stderr: output.stderr,
            });
        }

        let change = self
            .jj_in(
                &workspace_path,
                &["log", "-r", "@", "--no-graph", "-T", "change_id"],
            )
            .await;
        let change_id = change.stdout_trimmed().to_string();

        Ok(WorktreeInfo {
            name: name.to_string(),
            path: workspace_path,
            branch: (!change_id.is_empty()).then_some(change_id),
            is_main: false,
        })
    }

    async fn list_worktrees(&self) -> Vec<WorktreeInfo> {
        let output = self.jj(&["workspace", "list"]).await;
        if !output.success() {
            return Vec::new();
        }

        output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_workspace_line)
            .map(|(name, path, change_id)| WorktreeInfo {
                is_main: name == "default",
                name,
                path: PathBuf::from(path),
                branch: change_id,
            })
            .collect()
    }

    async fn remove_worktree(&self, name: &str) -> bool {
        info!("Removing jj workspace: {}", name);

        let output = self.jj(&["workspace", "forget", name]).await;
        if !output.success() {
            warn!("Failed to forget workspace: {}", output.stderr);
            return false;
        }

        let workspace_path = self.worktree_base.join(name);
        if workspace_path.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&workspace_path).await {
                warn!("Failed to remove workspace directory: {}", e);
            }
        }

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

        let output = match strategy {
            MergeStrategy::Squash => {
                self.jj(&["squash", "--from", source, "--into", &target]).await
            }
            MergeStrategy::Rebase => self.jj(&["rebase", "-s", source, "-d", &target]).await,
            MergeStrategy::Merge => {
                let message = format!("Merge {source}");
                self.jj(&["new", source, &target, "-m", &message]).await
            }
        };

        if !output.success() {
            if output.stderr.contains("conflict") || output.stderr.contains("Conflict") {
                // jj has no cheap per-file conflict enumeration
                return MergeResult::conflicted(Vec::new());
            }

            return MergeResult::failed(format!("Merge failed: {}", output.stderr));
        }

        let head = self
            .jj(&["log", "-r", "@", "--no-graph", "-T", "commit_id"])
            .await;
        MergeResult::ok(head.stdout_trimmed())
    }

    async fn current_branch(&self) -> String {
        let output = self
            .jj(&["log", "-r", "@", "--no-graph", "-T", "change_id"])
            .await;
        if !output.success() {
            return "@".to_string();
        }
        output.stdout_trimmed().to_string()
    }

    async fn default_branch(&self) -> String {
        let output = self.jj(&["bookmark", "list"]).await;
        if output.success() {
            for name in ["main", "master", "trunk"] {
                if output.stdout.contains(name) {
                    return name.to_string();
                }
            }
        }

        "root()".to_string()
    }

    async fn has_uncommitted_changes(&self) -> bool {
        // The jj working copy is always a commit; look for actual file
        // modifications in the status output
        let output = self.jj(&["status"]).await;
        output.stdout.contains("Working copy changes:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace_line_with_change_id() {
        let (name, path, change) =
            parse_workspace_line("default: /work/project (qpvuntsm)").unwrap();
        assert_eq!(name, "default");
        assert_eq!(path, "/work/project");
        assert_eq!(change.as_deref(), Some("qpvuntsm"));
    }

    #[test]
    fn test_parse_workspace_line_without_change_id() {
        let (name, path, change) =
            parse_workspace_line("proj-issue-1: /work/project-workspaces/proj-issue-1").unwrap();
        assert_eq!(name, "proj-issue-1");
        assert_eq!(path, "/work/project-workspaces/proj-issue-1");
        assert!(change.is_none());
    }

    #[test]
    fn test_parse_workspace_line_garbage() {
        assert!(parse_workspace_line("").is_none());
    }

    #[test]
    fn test_workspace_base_is_sibling() {
        let adapter = JujutsuAdapter::new("/work/project");
        assert_eq!(
            adapter.worktree_base(),
            Path::new("/work/project-workspaces")
        );
    }

    #[test]
    fn test_kind() {
        let adapter = JujutsuAdapter::new("/work/project");
        assert_eq!(adapter.kind(), VcsKind::Jj);
    }
}
