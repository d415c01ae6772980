// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for gaffer.
//!
//! Handles loading and merging of configuration from multiple sources:
//! - Global config: ~/.gaffer/config.json
//! - Workspace config: .gaffer.json, .gaffer/config.json, or gaffer.config.json
//! - Local config: .gaffer.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod types;

pub use loader::{
    find_workspace_root, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_local_config, load_workspace_config, save_workspace_config,
    CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use types::{
    DelegationSection, ResolvedConfig, WorkspaceConfig, WorktreeSection,
    DEFAULT_DELEGATION_TIMEOUT_MS, DEFAULT_SMALL_MODEL_TIMEOUT_MS,
};

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub host_url: Option<String>,
    pub delegation_timeout_ms: Option<u64>,
}

/// Load and merge all configuration sources for a workspace.
///
/// Files that fail to parse are reported, not silently skipped, so a typo in
/// `.gaffer.json` does not quietly fall back to defaults.
pub fn load_config(workspace_root: &Path, cli: CliOptions) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    Ok(merge_config(global, workspace, local, cli))
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.gaffer.local.json)
/// 3. Workspace config (.gaffer.json)
/// 4. Global config (~/.gaffer/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    if cli.host_url.is_some() {
        result.host_url = cli.host_url;
    }
    if let Some(ms) = cli.delegation_timeout_ms {
        result.delegation_timeout = Duration::from_millis(ms);
    }

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if config.host_url.is_some() {
        result.host_url = config.host_url.clone();
    }

    if let Some(ref delegation) = config.delegation {
        if let Some(ms) = delegation.timeout_ms {
            result.delegation_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = delegation.small_model_timeout_ms {
            result.small_model_timeout = Duration::from_millis(ms);
        }
    }

    if let Some(ref worktrees) = config.worktrees {
        if let Some(auto_cleanup) = worktrees.auto_cleanup {
            result.worktree_auto_cleanup = auto_cleanup;
        }
        if worktrees.base_path.is_some() {
            result.worktree_base_path = worktrees.base_path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_timeout(ms: u64) -> WorkspaceConfig {
        WorkspaceConfig {
            delegation: Some(DelegationSection {
                timeout_ms: Some(ms),
                small_model_timeout_ms: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_precedence() {
        let merged = merge_config(
            Some(with_timeout(1000)),
            Some(with_timeout(2000)),
            Some(with_timeout(3000)),
            CliOptions::default(),
        );
        assert_eq!(merged.delegation_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn test_cli_overrides_all() {
        let merged = merge_config(
            None,
            Some(with_timeout(2000)),
            None,
            CliOptions {
                host_url: Some("http://localhost:9999".to_string()),
                delegation_timeout_ms: Some(500),
            },
        );
        assert_eq!(merged.delegation_timeout, Duration::from_millis(500));
        assert_eq!(merged.host_url.as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn test_merge_empty_sources() {
        let merged = merge_config(None, None, None, CliOptions::default());
        assert_eq!(
            merged.delegation_timeout,
            Duration::from_millis(DEFAULT_DELEGATION_TIMEOUT_MS)
        );
    }
}
