// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent selection via the small model.
//!
//! Picks the best agent identity for a task, falling back gracefully when
//! the small model is unavailable. Selection is an optimization, never a
//! hard dependency: every failure path yields "no selection" and the caller
//! lets the host decide.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::host::HostClient;
use crate::types::AgentInfo;

use super::small_model::{prompt_small_model, SmallModelOptions};

/// Maximum task description length included in the selection prompt.
const TASK_DESCRIPTION_LIMIT: usize = 1000;

/// Hint about the type of task being delegated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Planning,
    Coding,
    Research,
    Review,
    General,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Planning => write!(f, "planning"),
            TaskType::Coding => write!(f, "coding"),
            TaskType::Research => write!(f, "research"),
            TaskType::Review => write!(f, "review"),
            TaskType::General => write!(f, "general"),
        }
    }
}

/// Response format demanded of the small model.
#[derive(Debug, Deserialize)]
struct AgentSelectionResponse {
    agent: String,
    #[serde(default)]
    reason: String,
}

/// Selects agents for delegated tasks, caching discovery results.
///
/// Agent sets change rarely within a process lifetime, so discovery results
/// are cached until [`clear_cache`](AgentSelector::clear_cache) is called.
pub struct AgentSelector {
    host: Arc<dyn HostClient>,
    timeout: Duration,
    cache: RwLock<Option<Vec<AgentInfo>>>,
}

impl AgentSelector {
    /// Create a new selector with the given small-model timeout.
    pub fn new(host: Arc<dyn HostClient>, timeout: Duration) -> Self {
        Self {
            host,
            timeout,
            cache: RwLock::new(None),
        }
    }

    /// Discover available agents from the host. Results are cached.
    pub async fn discover_agents(&self) -> Vec<AgentInfo> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return cached.clone();
        }

        match self.host.list_agents().await {
            Ok(agents) => {
                *self.cache.write().await = Some(agents.clone());
                agents
            }
            Err(e) => {
                warn!("Failed to discover agents: {}", e);
                Vec::new()
            }
        }
    }

    /// Clear the agent cache. Call this if agents may have changed.
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    /// Select the best agent for a task using the small model.
    ///
    /// Returns `None` if:
    /// - `agents` is empty (no call is made)
    /// - the small model is not configured or times out
    /// - the response is invalid
    /// - the selected agent is not in the supplied list
    pub async fn select_agent(
        &self,
        agents: &[AgentInfo],
        task_description: &str,
        task_type: Option<TaskType>,
    ) -> Option<String> {
        if agents.is_empty() {
            info!("No agents available for selection");
            return None;
        }

        let agent_list = agents
            .iter()
            .map(|a| {
                format!(
                    "- {}: {}",
                    a.name,
                    a.description.as_deref().unwrap_or("(no description)")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let task_type_hint = task_type
            .map(|t| format!("\nTASK TYPE: {t}"))
            .unwrap_or_default();
        let truncated: String = task_description.chars().take(TASK_DESCRIPTION_LIMIT).collect();

        let prompt = format!(
            "Select the best agent for this task.\n\n\
             AVAILABLE AGENTS:\n{agent_list}\n{task_type_hint}\n\
             TASK DESCRIPTION:\n{truncated}\n\n\
             Respond with ONLY valid JSON in this exact format:\n\
             {{\"agent\": \"agent-name\", \"reason\": \"brief reason for selection\"}}"
        );

        let response = match prompt_small_model::<AgentSelectionResponse>(
            self.host.as_ref(),
            SmallModelOptions {
                prompt,
                timeout: self.timeout,
                session_title: "Agent Selection".to_string(),
            },
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                info!("Agent selection skipped: {}", e);
                return None;
            }
        };

        if !agents.iter().any(|a| a.name == response.agent) {
            warn!("Small model selected unknown agent: {}", response.agent);
            return None;
        }

        info!("Selected agent: {} ({})", response.agent, response.reason);
        Some(response.agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    fn agents() -> Vec<AgentInfo> {
        vec![
            AgentInfo::new("coder", "Writes and edits code"),
            AgentInfo::new("researcher", "Investigates and reports"),
        ]
    }

    #[tokio::test]
    async fn test_select_agent_empty_list_makes_no_call() {
        let host = Arc::new(InMemoryHost::new().with_small_model("small-1"));
        let selector = AgentSelector::new(host.clone(), Duration::from_secs(1));

        let selected = selector.select_agent(&[], "Implement auth", None).await;

        assert!(selected.is_none());
        assert!(host.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_select_agent_happy_path() {
        let host = Arc::new(InMemoryHost::new().with_small_model("small-1"));
        host.script_reply(r#"{"agent": "coder", "reason": "code task"}"#);
        let selector = AgentSelector::new(host.clone(), Duration::from_secs(1));

        let selected = selector
            .select_agent(&agents(), "Implement auth", Some(TaskType::Coding))
            .await;

        assert_eq!(selected.as_deref(), Some("coder"));

        let prompts = host.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].text.contains("TASK TYPE: coding"));
        assert!(prompts[0].text.contains("- coder: Writes and edits code"));
    }

    #[tokio::test]
    async fn test_select_agent_unknown_agent_rejected() {
        let host = Arc::new(InMemoryHost::new().with_small_model("small-1"));
        host.script_reply(r#"{"agent": "ghost", "reason": "no such agent"}"#);
        let selector = AgentSelector::new(host, Duration::from_secs(1));

        let selected = selector.select_agent(&agents(), "Implement auth", None).await;
        assert!(selected.is_none());
    }

    #[tokio::test]
    async fn test_select_agent_no_small_model() {
        let host = Arc::new(InMemoryHost::new());
        let selector = AgentSelector::new(host, Duration::from_secs(1));

        let selected = selector.select_agent(&agents(), "Implement auth", None).await;
        assert!(selected.is_none());
    }

    #[tokio::test]
    async fn test_discover_agents_cached() {
        let host = Arc::new(InMemoryHost::new().with_agents(agents()));
        let selector = AgentSelector::new(host, Duration::from_secs(1));

        let first = selector.discover_agents().await;
        assert_eq!(first.len(), 2);

        let second = selector.discover_agents().await;
        assert_eq!(second, first);

        selector.clear_cache().await;
        let third = selector.discover_agents().await;
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn test_task_description_truncated() {
        let host = Arc::new(InMemoryHost::new().with_small_model("small-1"));
        host.script_reply(r#"{"agent": "coder", "reason": "x"}"#);
        let selector = AgentSelector::new(host.clone(), Duration::from_secs(1));

        let long_task = "x".repeat(5000);
        selector.select_agent(&agents(), &long_task, None).await;

        let prompt = &host.recorded_prompts()[0].text;
        assert!(!prompt.contains(&"x".repeat(1001)));
        assert!(prompt.contains(&"x".repeat(1000)));
    }
}
