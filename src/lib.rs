// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gaffer - background agent delegation with VCS worktree isolation.
//!
//! Gaffer coordinates work handed off to background agent sessions: it
//! creates isolated worktrees for them to edit in, fires their prompts
//! without blocking the requesting conversation, tracks completion through
//! the host's idle-event stream, and batches the results back to the
//! session that asked.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Host wire types (sessions, messages, agent identities)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`host`] - Session RPC boundary (HTTP binding + in-memory host)
//! - [`agents`] - Agent discovery and small-model selection
//! - [`vcs`] - Git and Jujutsu adapters behind one capability contract
//! - [`worktree`] - VCS detection and project-scoped worktree management
//! - [`delegation`] - The delegation state machine and notification batching
//! - [`telemetry`] - Tracing initialization
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gaffer::delegation::{CreateDelegationOptions, DelegationConfig, DelegationManager};
//! use gaffer::host::HttpHostClient;
//!
//! let host = Arc::new(HttpHostClient::new("http://localhost:4096")?);
//! let manager = Arc::new(DelegationManager::new(
//!     ".projects/my-project",
//!     Some(host),
//!     DelegationConfig::default(),
//! ));
//!
//! let delegation = manager
//!     .create("my-project", CreateDelegationOptions::new("issue-1", "Implement auth"))
//!     .await?;
//! ```

pub mod agents;
pub mod config;
pub mod delegation;
pub mod error;
pub mod host;
pub mod telemetry;
pub mod types;
pub mod vcs;
pub mod worktree;

// Re-export commonly used types at crate root
pub use delegation::{
    CreateDelegationOptions, Delegation, DelegationConfig, DelegationManager, DelegationStatus,
};
pub use error::{ConfigError, DelegationError, HostError, Result};
pub use host::{HostClient, HttpHostClient, InMemoryHost};
pub use vcs::{MergeResult, MergeStrategy, VcsAdapter, VcsKind, WorktreeInfo};
pub use worktree::{CreateWorktreeOptions, MergeWorktreeOptions, WorktreeManager};

/// Gaffer version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        // Verify key types are accessible from the crate root
        let _options = CreateDelegationOptions::new("issue-1", "prompt");
        let _strategy = MergeStrategy::default();
        let _host = InMemoryHost::new();
    }
}
