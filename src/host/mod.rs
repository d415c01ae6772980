// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host session RPC boundary.
//!
//! The hosting chat client is a black box to this crate: delegations run in
//! sessions the host owns, prompts are fired over its RPC, and completion is
//! discovered from its event stream. [`HostClient`] captures exactly the
//! operations consumed; nothing about the wire protocol leaks past it.
//!
//! Two implementations ship here:
//!
//! - [`HttpHostClient`] - JSON-over-HTTP binding against a host base URL.
//! - [`InMemoryHost`] - deterministic in-process host for tests and the
//!   CLI's offline mode; records every outbound prompt.

mod http;
mod memory;

pub use http::HttpHostClient;
pub use memory::{InMemoryHost, RecordedPrompt};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::HostError;
use crate::types::{AgentInfo, MessageItem, Part, Session};

/// Request to create a new session.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionRequest {
    /// Human-readable session title.
    pub title: Option<String>,
    /// Parent session, for nested sessions.
    pub parent_id: Option<String>,
    /// Agent identity to run the session as.
    pub agent: Option<String>,
}

impl CreateSessionRequest {
    /// Create a request with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            parent_id: None,
            agent: None,
        }
    }

    /// Set the parent session.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the agent identity.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Request to send a prompt into a session.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// Content parts to send.
    pub parts: Vec<Part>,
    /// Agent identity override for this prompt.
    pub agent: Option<String>,
    /// When set, the host records the message without generating a reply.
    pub no_reply: bool,
    /// Per-tool enable map; `false` disables the tool for this prompt.
    pub tools: HashMap<String, bool>,
}

impl PromptRequest {
    /// Create a plain text prompt.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            agent: None,
            no_reply: false,
            tools: HashMap::new(),
        }
    }

    /// Mark this prompt as silent (no reply generated).
    pub fn silent(mut self) -> Self {
        self.no_reply = true;
        self
    }

    /// Set the agent identity for this prompt.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Disable a set of tools for this prompt.
    pub fn with_disabled_tools<'a>(mut self, tools: impl IntoIterator<Item = &'a str>) -> Self {
        for tool in tools {
            self.tools.insert(tool.to_string(), false);
        }
        self
    }

    /// Concatenated text content of the prompt.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Client for the host's session RPC.
///
/// All operations are suspension points; none block the calling task for
/// their native duration.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// List the agent identities the host makes available.
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, HostError>;

    /// The configured auxiliary small model, if any.
    async fn small_model(&self) -> Result<Option<String>, HostError>;

    /// Create a new session.
    async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, HostError>;

    /// Look up a session by id.
    async fn get_session(&self, id: &str) -> Result<Option<Session>, HostError>;

    /// Send a prompt into a session.
    ///
    /// Returns the assistant reply when the host produces one synchronously;
    /// background sessions typically return `None` and signal completion via
    /// the idle event stream instead.
    async fn prompt(
        &self,
        session_id: &str,
        req: PromptRequest,
    ) -> Result<Option<MessageItem>, HostError>;

    /// Fetch the full message history of a session.
    async fn messages(&self, session_id: &str) -> Result<Vec<MessageItem>, HostError>;

    /// Delete a session.
    async fn delete_session(&self, session_id: &str) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request_builders() {
        let req = PromptRequest::text("hello")
            .silent()
            .with_agent("coder")
            .with_disabled_tools(["issue_create", "project_close"]);

        assert!(req.no_reply);
        assert_eq!(req.agent.as_deref(), Some("coder"));
        assert_eq!(req.tools.get("issue_create"), Some(&false));
        assert_eq!(req.tools.get("project_close"), Some(&false));
        assert_eq!(req.text_content(), "hello");
    }

    #[test]
    fn test_create_session_request_builders() {
        let req = CreateSessionRequest::titled("Delegation: issue-1")
            .with_parent("ses-0")
            .with_agent("researcher");

        assert_eq!(req.title.as_deref(), Some("Delegation: issue-1"));
        assert_eq!(req.parent_id.as_deref(), Some("ses-0"));
        assert_eq!(req.agent.as_deref(), Some("researcher"));
    }
}
