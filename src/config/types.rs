// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delegation timeout: 15 minutes.
pub const DEFAULT_DELEGATION_TIMEOUT_MS: u64 = 15 * 60 * 1000;

/// Default small-model query timeout: 30 seconds.
pub const DEFAULT_SMALL_MODEL_TIMEOUT_MS: u64 = 30 * 1000;

/// Workspace configuration for gaffer.
/// Can be defined in .gaffer.json or .gaffer/config.json in the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Base URL of the host session RPC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_url: Option<String>,

    /// Delegation settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationSection>,

    /// Worktree settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktrees: Option<WorktreeSection>,
}

/// Delegation settings as stored in config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationSection {
    /// Timeout for background delegations in milliseconds (default: 15 minutes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Timeout for small model queries in milliseconds (default: 30 seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_model_timeout_ms: Option<u64>,
}

/// Worktree settings as stored in config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeSection {
    /// Remove worktrees automatically after a successful merge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cleanup: Option<bool>,

    /// Override the base directory where worktrees are created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
}

/// Fully resolved configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Base URL of the host session RPC, if any.
    pub host_url: Option<String>,
    /// Timeout for background delegations.
    pub delegation_timeout: Duration,
    /// Timeout for small model queries.
    pub small_model_timeout: Duration,
    /// Remove worktrees automatically after a successful merge.
    pub worktree_auto_cleanup: bool,
    /// Override the base directory where worktrees are created.
    pub worktree_base_path: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            host_url: None,
            delegation_timeout: Duration::from_millis(DEFAULT_DELEGATION_TIMEOUT_MS),
            small_model_timeout: Duration::from_millis(DEFAULT_SMALL_MODEL_TIMEOUT_MS),
            worktree_auto_cleanup: true,
            worktree_base_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.delegation_timeout, Duration::from_secs(15 * 60));
        assert_eq!(config.small_model_timeout, Duration::from_secs(30));
        assert!(config.worktree_auto_cleanup);
        assert!(config.host_url.is_none());
    }

    #[test]
    fn test_workspace_config_camel_case() {
        let json = r#"{
            "hostUrl": "http://localhost:4096",
            "delegation": { "timeoutMs": 60000, "smallModelTimeoutMs": 5000 },
            "worktrees": { "autoCleanup": false }
        }"#;

        let config: WorkspaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host_url.as_deref(), Some("http://localhost:4096"));
        assert_eq!(config.delegation.as_ref().unwrap().timeout_ms, Some(60000));
        assert_eq!(config.worktrees.as_ref().unwrap().auto_cleanup, Some(false));
    }

    #[test]
    fn test_workspace_config_empty() {
        let config: WorkspaceConfig = serde_json::from_str("{}").unwrap();
        assert!(config.host_url.is_none());
        assert!(config.delegation.is_none());
    }
}
