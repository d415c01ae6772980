// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delegation records and lifecycle types.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResolvedConfig;
use crate::vcs::VcsKind;

/// Lifecycle status of a delegation.
///
/// `pending → running → {completed | failed | cancelled | timeout}`;
/// terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl DelegationStatus {
    /// Check if this status represents a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    /// Check if this status represents an active (not terminal) state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// A unit of background-delegated work.
///
/// One durable JSON record per delegation, addressable by id, owned
/// exclusively by the [`DelegationManager`](super::DelegationManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    pub id: String,
    pub project_id: String,
    pub issue_id: String,
    /// Isolated worktree path, when the work runs isolated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    /// Branch (git) or change id (jj) of the worktree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_branch: Option<String>,
    /// VCS kind of the worktree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsKind>,
    pub status: DelegationStatus,
    /// Backing session id; set exactly while `running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Session that requested the delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    /// Top of the parent-session chain; notification destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_session_id: Option<String>,
    /// Selected agent identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// The original task prompt.
    pub prompt: String,
    /// Synthesized short title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Synthesized one-line description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Result text, set on completion/timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text, set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly when the status is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Delegation {
    /// Whether this delegation has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Options for creating a delegation.
#[derive(Debug, Clone)]
pub struct CreateDelegationOptions {
    pub issue_id: String,
    pub prompt: String,
    pub worktree_path: Option<PathBuf>,
    pub worktree_branch: Option<String>,
    pub vcs: Option<VcsKind>,
    pub agent: Option<String>,
    pub parent_session_id: Option<String>,
    /// Per-delegation timeout override.
    pub timeout: Option<Duration>,
}

impl CreateDelegationOptions {
    /// Create options with the required fields.
    pub fn new(issue_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            prompt: prompt.into(),
            worktree_path: None,
            worktree_branch: None,
            vcs: None,
            agent: None,
            parent_session_id: None,
            timeout: None,
        }
    }

    /// Attach an isolated worktree.
    pub fn with_worktree(
        mut self,
        path: impl Into<PathBuf>,
        branch: Option<String>,
        vcs: VcsKind,
    ) -> Self {
        self.worktree_path = Some(path.into());
        self.worktree_branch = branch;
        self.vcs = Some(vcs);
        self
    }

    /// Pin a specific agent identity.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the requesting session.
    pub fn with_parent_session(mut self, session_id: impl Into<String>) -> Self {
        self.parent_session_id = Some(session_id.into());
        self
    }

    /// Override the delegation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Filter options for listing delegations.
#[derive(Debug, Clone, Default)]
pub struct ListDelegationOptions {
    pub status: Option<DelegationStatus>,
    pub issue_id: Option<String>,
}

/// Timing configuration for the delegation manager.
#[derive(Debug, Clone)]
pub struct DelegationConfig {
    /// Timeout for background delegations.
    pub timeout: Duration,
    /// Timeout for small model queries.
    pub small_model_timeout: Duration,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15 * 60),
            small_model_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ResolvedConfig> for DelegationConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            timeout: config.delegation_timeout,
            small_model_timeout: config.small_model_timeout,
        }
    }
}

/// Tools a delegated session may never use.
///
/// Covers recursive delegation and project/issue state mutation. This set is
/// fixed at the protocol boundary; the delegated prompt restates the
/// restriction in natural language, but the deny-list is the actual control.
pub static DELEGATED_DENIED_TOOLS: &[&str] = &[
    "issue_claim",
    "project_plan",
    "project_create",
    "project_close",
    "project_focus",
    "issue_create",
    "issue_update",
];

/// Check if a tool is denied for delegated sessions.
pub fn is_denied_tool(tool_name: &str) -> bool {
    DELEGATED_DENIED_TOOLS.contains(&tool_name)
}

/// Get the set of denied tools.
pub fn denied_tools_set() -> HashSet<&'static str> {
    DELEGATED_DENIED_TOOLS.iter().copied().collect()
}
