// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Notification blocks sent back to the root session.
//!
//! Each terminal delegation produces one tagged block. When the delegation
//! ran in an isolated worktree, the block embeds a three-step merge runbook
//! in the right VCS dialect so the consuming agent can fold the work back
//! without guessing commands.

use crate::vcs::VcsKind;
use crate::worktree::worktree_name;

use super::types::{Delegation, DelegationStatus};

/// Placeholder when a delegation produced no result text.
const EMPTY_RESULT: &str = "(no result text was produced)";

/// Status word used in the notification tag.
pub fn status_word(status: DelegationStatus) -> &'static str {
    match status {
        DelegationStatus::Completed => "complete",
        DelegationStatus::Pending => "pending",
        DelegationStatus::Running => "running",
        DelegationStatus::Failed => "failed",
        DelegationStatus::Cancelled => "cancelled",
        DelegationStatus::Timeout => "timeout",
    }
}

/// Render the result block for a terminal delegation.
pub fn render_notification(delegation: &Delegation) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "<delegation-notification id=\"{}\" issue=\"{}\" status=\"{}\">",
        delegation.id,
        delegation.issue_id,
        status_word(delegation.status)
    ));

    if let Some(title) = &delegation.title {
        lines.push(format!("**Title:** {title}"));
    }
    if let Some(description) = &delegation.description {
        lines.push(format!("**Description:** {description}"));
    }

    if let Some(path) = &delegation.worktree_path {
        let vcs = delegation.vcs.unwrap_or(VcsKind::Git);
        let branch = delegation.worktree_branch.as_deref().unwrap_or("(unknown)");
        let name = worktree_name(&delegation.project_id, &delegation.issue_id);

        lines.push(String::new());
        lines.push("<worktree>".to_string());
        lines.push(format!("**Path:** {}", path.display()));
        lines.push(format!("**Branch:** {branch}"));
        lines.push(format!("**VCS:** {vcs}"));
        lines.push(String::new());
        lines.push("To merge this work back:".to_string());
        lines.extend(merge_runbook(vcs, branch, &path.display().to_string(), &name));
        lines.push("</worktree>".to_string());
    }

    lines.push(String::new());
    lines.push("<result>".to_string());
    lines.push(
        delegation
            .result
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| EMPTY_RESULT.to_string()),
    );
    lines.push("</result>".to_string());

    if let Some(error) = &delegation.error {
        lines.push("<error>".to_string());
        lines.push(error.clone());
        lines.push("</error>".to_string());
    }

    lines.push("</delegation-notification>".to_string());

    lines.join("\n")
}

/// Three-step merge runbook in the given VCS dialect.
fn merge_runbook(vcs: VcsKind, branch: &str, path: &str, name: &str) -> Vec<String> {
    match vcs {
        VcsKind::Git => vec![
            format!("1. Review the changes: `git diff main...{branch}`"),
            format!(
                "2. Merge them: `git merge --squash {branch} && git commit -m \"Merge {name}\"`"
            ),
            format!("3. Clean up: `git worktree remove {path} --force && git branch -D {branch}`"),
        ],
        VcsKind::Jj => vec![
            format!("1. Review the changes: `jj diff -r {branch}`"),
            format!("2. Merge them: `jj squash --from {branch} --into main`"),
            format!("3. Clean up: `jj workspace forget {name}`"),
        ],
    }
}

/// Note appended to silent notifications while other delegations remain.
pub fn render_remaining_note(remaining: usize) -> String {
    let plural = if remaining == 1 { "" } else { "s" };
    format!(
        "({remaining} delegation{plural} still running for this session; \
         you will be prompted again when all have finished.)"
    )
}

/// The distinct all-complete summary sent after the final result block.
pub fn render_all_complete() -> String {
    "<delegation-all-complete>\n\
     All background delegations for this session have finished. \
     Review the results above, merge any worktrees, and continue with the next step.\n\
     </delegation-all-complete>"
        .to_string()
}

/// Context block describing running delegations, injected when the host
/// compacts the root conversation so in-flight work survives the summary.
pub fn render_running_context(delegations: &[Delegation]) -> String {
    let mut lines: Vec<String> = vec![
        "<delegation-context>".to_string(),
        "## Running Delegations".to_string(),
        String::new(),
    ];

    for delegation in delegations {
        lines.push(format!("### {}", delegation.id));
        lines.push(format!("- **Issue:** {}", delegation.issue_id));
        lines.push(format!(
            "- **Agent:** {}",
            delegation.agent.as_deref().unwrap_or("(auto)")
        ));
        lines.push(format!("- **Started:** {}", delegation.started_at.to_rfc3339()));
        if let Some(path) = &delegation.worktree_path {
            lines.push(format!("- **Worktree:** {}", path.display()));
        }
        lines.push(String::new());
    }

    lines.push(
        "> You will be notified via `<delegation-notification>` when delegations complete."
            .to_string(),
    );
    lines.push("> Do NOT poll for status; continue productive work.".to_string());
    lines.push("</delegation-context>".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn terminal(status: DelegationStatus) -> Delegation {
        Delegation {
            id: "del-abc-12345678".to_string(),
            project_id: "proj".to_string(),
            issue_id: "issue-1".to_string(),
            worktree_path: None,
            worktree_branch: None,
            vcs: None,
            status,
            session_id: None,
            parent_session_id: None,
            root_session_id: None,
            agent: None,
            prompt: "Do it".to_string(),
            title: None,
            description: None,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_status_word() {
        assert_eq!(status_word(DelegationStatus::Completed), "complete");
        assert_eq!(status_word(DelegationStatus::Timeout), "timeout");
        assert_eq!(status_word(DelegationStatus::Failed), "failed");
    }

    #[test]
    fn test_notification_basic_shape() {
        let mut delegation = terminal(DelegationStatus::Completed);
        delegation.result = Some("All done".to_string());
        delegation.title = Some("Auth implemented".to_string());

        let block = render_notification(&delegation);

        assert!(block.starts_with(
            "<delegation-notification id=\"del-abc-12345678\" issue=\"issue-1\" status=\"complete\">"
        ));
        assert!(block.contains("**Title:** Auth implemented"));
        assert!(block.contains("<result>\nAll done\n</result>"));
        assert!(block.ends_with("</delegation-notification>"));
        assert!(!block.contains("<error>"));
        assert!(!block.contains("<worktree>"));
    }

    #[test]
    fn test_notification_empty_result_placeholder() {
        let block = render_notification(&terminal(DelegationStatus::Cancelled));
        assert!(block.contains("(no result text was produced)"));
        assert!(block.contains("status=\"cancelled\""));
    }

    #[test]
    fn test_notification_error_section() {
        let mut delegation = terminal(DelegationStatus::Failed);
        delegation.error = Some("session creation failed".to_string());

        let block = render_notification(&delegation);
        assert!(block.contains("<error>\nsession creation failed\n</error>"));
    }

    #[test]
    fn test_notification_git_worktree_runbook() {
        let mut delegation = terminal(DelegationStatus::Completed);
        delegation.worktree_path = Some(PathBuf::from("/work/project-worktrees/proj/issue-1"));
        delegation.worktree_branch = Some("proj-issue-1".to_string());
        delegation.vcs = Some(VcsKind::Git);

        let block = render_notification(&delegation);

        assert!(block.contains("<worktree>"));
        assert!(block.contains("**VCS:** git"));
        assert!(block.contains("git diff main...proj-issue-1"));
        assert!(block.contains("git merge --squash proj-issue-1"));
        assert!(block.contains("git worktree remove /work/project-worktrees/proj/issue-1 --force"));
        assert!(block.contains("git branch -D proj-issue-1"));
    }

    #[test]
    fn test_notification_jj_worktree_runbook() {
        let mut delegation = terminal(DelegationStatus::Completed);
        delegation.worktree_path = Some(PathBuf::from("/work/project-workspaces/proj/issue-1"));
        delegation.worktree_branch = Some("qpvuntsm".to_string());
        delegation.vcs = Some(VcsKind::Jj);

        let block = render_notification(&delegation);

        assert!(block.contains("**VCS:** jj"));
        assert!(block.contains("jj diff -r qpvuntsm"));
        assert!(block.contains("jj squash --from qpvuntsm --into main"));
        assert!(block.contains("jj workspace forget proj/issue-1"));
    }

    #[test]
    fn test_remaining_note_pluralizes() {
        assert!(render_remaining_note(1).contains("1 delegation still running"));
        assert!(render_remaining_note(3).contains("3 delegations still running"));
    }

    #[test]
    fn test_running_context() {
        let delegation = terminal(DelegationStatus::Running);
        let block = render_running_context(&[delegation]);

        assert!(block.starts_with("<delegation-context>"));
        assert!(block.contains("## Running Delegations"));
        assert!(block.contains("- **Agent:** (auto)"));
        assert!(block.contains("Do NOT poll"));
    }
}
