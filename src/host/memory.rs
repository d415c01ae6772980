// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deterministic in-process host.
//!
//! Implements [`HostClient`] entirely in memory: sessions live in a map,
//! every outbound prompt is recorded, and assistant replies are scripted by
//! the caller. Used by the test suites and by the CLI when no host URL is
//! configured.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::HostError;
use crate::types::{AgentInfo, MessageError, MessageInfo, MessageItem, Part, Role, Session};

use super::{CreateSessionRequest, HostClient, PromptRequest};

/// A prompt the host received, flattened for assertions.
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    /// Target session.
    pub session_id: String,
    /// Concatenated text content.
    pub text: String,
    /// Whether the no-reply flag was set.
    pub no_reply: bool,
    /// Agent identity override, if any.
    pub agent: Option<String>,
    /// Tools disabled for this prompt.
    pub disabled_tools: Vec<String>,
}

/// In-memory [`HostClient`] implementation.
#[derive(Default)]
pub struct InMemoryHost {
    agents: Vec<AgentInfo>,
    small_model: Option<String>,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<String, Session>>,
    histories: Mutex<HashMap<String, Vec<MessageItem>>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
    scripted_replies: Mutex<VecDeque<String>>,
    deleted: Mutex<Vec<String>>,
    fail_session_creates: AtomicBool,
}

impl InMemoryHost {
    /// Create an empty host with no agents and no small model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the available agent identities.
    pub fn with_agents(mut self, agents: Vec<AgentInfo>) -> Self {
        self.agents = agents;
        self
    }

    /// Configure an auxiliary small model.
    pub fn with_small_model(mut self, model: impl Into<String>) -> Self {
        self.small_model = Some(model.into());
        self
    }

    /// Make every subsequent `create_session` call fail.
    pub fn set_fail_session_creates(&self, fail: bool) {
        self.fail_session_creates.store(fail, Ordering::SeqCst);
    }

    /// Queue an assistant reply for the next prompt that expects one.
    pub fn script_reply(&self, text: impl Into<String>) {
        self.scripted_replies
            .lock()
            .unwrap()
            .push_back(text.into());
    }

    /// Seed a session directly, bypassing `create_session`.
    pub fn seed_session(&self, id: impl Into<String>, parent_id: Option<&str>) {
        let id = id.into();
        self.sessions.lock().unwrap().insert(
            id.clone(),
            Session {
                id: id.clone(),
                title: None,
                parent_id: parent_id.map(String::from),
            },
        );
        self.histories.lock().unwrap().entry(id).or_default();
    }

    /// Append an assistant message to a session's history.
    pub fn push_assistant_message(&self, session_id: &str, text: impl Into<String>) {
        self.push_message(session_id, text, None);
    }

    /// Append an assistant message flagged as aborted/errored.
    pub fn push_errored_assistant_message(&self, session_id: &str, text: impl Into<String>) {
        self.push_message(
            session_id,
            text,
            Some(MessageError {
                name: "MessageAbortedError".to_string(),
                message: None,
            }),
        );
    }

    fn push_message(&self, session_id: &str, text: impl Into<String>, error: Option<MessageError>) {
        let mut histories = self.histories.lock().unwrap();
        let history = histories.entry(session_id.to_string()).or_default();
        let id = format!("msg-{}", history.len() + 1);
        history.push(MessageItem {
            info: MessageInfo {
                id,
                role: Role::Assistant,
                session_id: session_id.to_string(),
                error,
            },
            parts: vec![Part::text(text)],
        });
    }

    /// Every prompt received so far, in order.
    pub fn recorded_prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    /// Prompts received by a specific session, in order.
    pub fn prompts_for(&self, session_id: &str) -> Vec<RecordedPrompt> {
        self.recorded_prompts()
            .into_iter()
            .filter(|p| p.session_id == session_id)
            .collect()
    }

    /// Sessions deleted so far, in order.
    pub fn deleted_sessions(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostClient for InMemoryHost {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, HostError> {
        Ok(self.agents.clone())
    }

    async fn small_model(&self) -> Result<Option<String>, HostError> {
        Ok(self.small_model.clone())
    }

    async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, HostError> {
        if self.fail_session_creates.load(Ordering::SeqCst) {
            return Err(HostError::api("session creation disabled", 500));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session {
            id: format!("ses-{n}"),
            title: req.title,
            parent_id: req.parent_id,
        };

        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        self.histories
            .lock()
            .unwrap()
            .entry(session.id.clone())
            .or_default();

        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, HostError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn prompt(
        &self,
        session_id: &str,
        req: PromptRequest,
    ) -> Result<Option<MessageItem>, HostError> {
        let disabled_tools = {
            let mut disabled: Vec<String> = req
                .tools
                .iter()
                .filter(|(_, enabled)| !**enabled)
                .map(|(name, _)| name.clone())
                .collect();
            disabled.sort();
            disabled
        };

        self.prompts.lock().unwrap().push(RecordedPrompt {
            session_id: session_id.to_string(),
            text: req.text_content(),
            no_reply: req.no_reply,
            agent: req.agent.clone(),
            disabled_tools,
        });

        if req.no_reply {
            return Ok(None);
        }

        let reply = self.scripted_replies.lock().unwrap().pop_front();
        match reply {
            Some(text) => {
                self.push_assistant_message(session_id, &text);
                let history = self.histories.lock().unwrap();
                Ok(history
                    .get(session_id)
                    .and_then(|msgs| msgs.last().cloned()))
            }
            None => Ok(None),
        }
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<MessageItem>, HostError> {
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), HostError> {
        self.sessions.lock().unwrap().remove(session_id);
        self.histories.lock().unwrap().remove(session_id);
        self.deleted.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let host = InMemoryHost::new();
        let session = host
            .create_session(CreateSessionRequest::titled("test").with_parent("ses-root"))
            .await
            .unwrap();

        let fetched = host.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.parent_id.as_deref(), Some("ses-root"));
    }

    #[tokio::test]
    async fn test_prompt_recorded() {
        let host = InMemoryHost::new();
        let session = host
            .create_session(CreateSessionRequest::default())
            .await
            .unwrap();

        host.prompt(
            &session.id,
            PromptRequest::text("do the thing")
                .silent()
                .with_disabled_tools(["issue_create"]),
        )
        .await
        .unwrap();

        let prompts = host.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].text, "do the thing");
        assert!(prompts[0].no_reply);
        assert_eq!(prompts[0].disabled_tools, vec!["issue_create"]);
    }

    #[tokio::test]
    async fn test_scripted_reply() {
        let host = InMemoryHost::new();
        let session = host
            .create_session(CreateSessionRequest::default())
            .await
            .unwrap();

        host.script_reply(r#"{"agent": "coder", "reason": "best fit"}"#);

        let reply = host
            .prompt(&session.id, PromptRequest::text("pick one"))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.text().contains("coder"));

        let history = host.messages(&session.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let host = InMemoryHost::new();
        let session = host
            .create_session(CreateSessionRequest::default())
            .await
            .unwrap();

        host.delete_session(&session.id).await.unwrap();
        assert!(host.get_session(&session.id).await.unwrap().is_none());
        assert_eq!(host.deleted_sessions(), vec![session.id]);
    }

    #[tokio::test]
    async fn test_errored_messages_flagged() {
        let host = InMemoryHost::new();
        host.seed_session("ses-x", None);
        host.push_assistant_message("ses-x", "good");
        host.push_errored_assistant_message("ses-x", "partial");

        let messages = host.messages("ses-x").await.unwrap();
        assert!(messages[0].info.error.is_none());
        assert!(messages[1].info.error.is_some());
    }
}
