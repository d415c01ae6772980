// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-over-HTTP binding of the host session RPC.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::types::{AgentInfo, MessageItem, Part, Session};

use super::{CreateSessionRequest, HostClient, PromptRequest};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP implementation of [`HostClient`].
pub struct HttpHostClient {
    client: Client,
    base_url: String,
}

impl HttpHostClient {
    /// Create a new client against a host base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(HostError::from)?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, HostError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(HostError::api(
            format!("{} {}", status.as_u16(), body),
            status.as_u16(),
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptBody {
    parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    no_reply: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    tools: HashMap<String, bool>,
}

#[derive(Deserialize)]
struct ConfigResponse {
    #[serde(default)]
    small_model: Option<String>,
}

#[async_trait]
impl HostClient for HttpHostClient {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, HostError> {
        let response = self.client.get(self.url("/agent")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn small_model(&self) -> Result<Option<String>, HostError> {
        let response = self.client.get(self.url("/config")).send().await?;
        let response = Self::check(response).await?;
        let config: ConfigResponse = response.json().await?;
        Ok(config.small_model)
    }

    async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, HostError> {
        let body = CreateSessionBody {
            title: req.title,
            parent_id: req.parent_id,
            agent: req.agent,
        };

        let response = self
            .client
            .post(self.url("/session"))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, HostError> {
        let response = self
            .client
            .get(self.url(&format!("/session/{id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn prompt(
        &self,
        session_id: &str,
        req: PromptRequest,
    ) -> Result<Option<MessageItem>, HostError> {
        let body = PromptBody {
            parts: req.parts,
            agent: req.agent,
            no_reply: req.no_reply,
            tools: req.tools,
        };

        let response = self
            .client
            .post(self.url(&format!("/session/{session_id}/message")))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        Ok(response.json().await.ok())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<MessageItem>, HostError> {
        let response = self
            .client
            .get(self.url(&format!("/session/{session_id}/message")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), HostError> {
        let response = self
            .client
            .delete(self.url(&format!("/session/{session_id}")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = HttpHostClient::new("http://localhost:4096/").unwrap();
        assert_eq!(client.url("/agent"), "http://localhost:4096/agent");
    }

    #[test]
    fn test_prompt_body_omits_defaults() {
        let body = PromptBody {
            parts: vec![Part::text("hi")],
            agent: None,
            no_reply: false,
            tools: HashMap::new(),
        };

        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("noReply"));
        assert!(!json.contains("tools"));
        assert!(!json.contains("agent"));
    }

    #[test]
    fn test_prompt_body_serializes_flags() {
        let mut tools = HashMap::new();
        tools.insert("issue_create".to_string(), false);

        let body = PromptBody {
            parts: vec![Part::text("hi")],
            agent: Some("coder".to_string()),
            no_reply: true,
            tools,
        };

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"noReply\":true"));
        assert!(json.contains("\"issue_create\":false"));
    }
}
