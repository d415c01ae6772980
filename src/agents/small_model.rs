// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured queries against the host's auxiliary small model.
//!
//! The host may be configured with a low-cost model for quick decisions
//! (agent selection, result summarization). Queries run in a throwaway
//! session that is always deleted afterwards, succeed only when the reply
//! contains parseable JSON, and are bounded by a caller-specified timeout.
//! Callers are expected to degrade on any error; nothing here is a hard
//! dependency.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::HostError;
use crate::host::{CreateSessionRequest, HostClient, PromptRequest};

/// Errors from a small-model query. All of them mean "fall back".
#[derive(Error, Debug)]
pub enum SmallModelError {
    #[error("No small model configured")]
    NotConfigured,

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("No text response from small model")]
    NoText,

    #[error("No JSON found in response")]
    NoJson,

    #[error("JSON parsing error: {0}")]
    Json(String),
}

/// Options for a small-model query.
#[derive(Debug, Clone)]
pub struct SmallModelOptions {
    /// The prompt to send (should demand a JSON response).
    pub prompt: String,
    /// Maximum time to wait for the reply.
    pub timeout: Duration,
    /// Session title, for host-side debugging.
    pub session_title: String,
}

/// Prompt the small model for a structured JSON response.
///
/// Creates a temporary session, sends the prompt under a timeout, extracts
/// the first balanced `{...}` substring from the reply (tolerating
/// surrounding prose) and parses it into `T`. The temporary session is
/// deleted regardless of outcome.
pub async fn prompt_small_model<T: DeserializeOwned>(
    host: &dyn HostClient,
    options: SmallModelOptions,
) -> Result<T, SmallModelError> {
    if host.small_model().await?.is_none() {
        return Err(SmallModelError::NotConfigured);
    }

    let session = host
        .create_session(CreateSessionRequest::titled(options.session_title.clone()))
        .await?;

    let result = query(host, &session.id, &options).await;

    if let Err(e) = host.delete_session(&session.id).await {
        debug!("Failed to delete small-model session {}: {}", session.id, e);
    }

    result
}

async fn query<T: DeserializeOwned>(
    host: &dyn HostClient,
    session_id: &str,
    options: &SmallModelOptions,
) -> Result<T, SmallModelError> {
    let timeout_ms = options.timeout.as_millis() as u64;

    let reply = tokio::time::timeout(
        options.timeout,
        host.prompt(session_id, PromptRequest::text(options.prompt.clone())),
    )
    .await
    .map_err(|_| SmallModelError::Timeout(timeout_ms))??;

    let text = reply.map(|item| item.text()).filter(|t| !t.is_empty());
    let text = text.ok_or(SmallModelError::NoText)?;

    let json = extract_json(&text).ok_or(SmallModelError::NoJson)?;
    serde_json::from_str(json).map_err(|e| SmallModelError::Json(e.to_string()))
}

/// Extract the first balanced `{...}` substring from text.
///
/// Brace depth is tracked outside of string literals so prose around (or
/// inside) the JSON does not break extraction.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }

        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// A synthesized title/description pair for a delegation result.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResultSummary {
    pub title: String,
    pub description: String,
}

/// Maximum result text included in the summarization prompt.
const SUMMARY_INPUT_LIMIT: usize = 2000;

/// Ask the small model to summarize a delegation result.
///
/// Returns `None` on any failure; callers fall back to the first line /
/// first 200 characters of the raw result.
pub async fn summarize_result(
    host: &dyn HostClient,
    result: &str,
    timeout: Duration,
) -> Option<ResultSummary> {
    let truncated: String = result.chars().take(SUMMARY_INPUT_LIMIT).collect();

    let prompt = format!(
        "Summarize this task result.\n\n\
         RESULT:\n{truncated}\n\n\
         Respond with ONLY valid JSON in this exact format:\n\
         {{\"title\": \"short title (max 60 chars)\", \"description\": \"one-sentence description\"}}"
    );

    match prompt_small_model::<ResultSummary>(
        host,
        SmallModelOptions {
            prompt,
            timeout,
            session_title: "Result Summary".to_string(),
        },
    )
    .await
    {
        Ok(summary) => Some(summary),
        Err(e) => {
            debug!("Result summarization skipped: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(
            extract_json(r#"{"agent": "coder"}"#),
            Some(r#"{"agent": "coder"}"#)
        );
    }

    #[test]
    fn test_extract_json_surrounding_prose() {
        let text = r#"Sure! Here is the answer: {"agent": "coder", "reason": "x"} hope that helps"#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"agent": "coder", "reason": "x"}"#)
        );
    }

    #[test]
    fn test_extract_json_nested() {
        let text = r#"{"outer": {"inner": 1}} {"second": 2}"#;
        assert_eq!(extract_json(text), Some(r#"{"outer": {"inner": 1}}"#));
    }

    #[test]
    fn test_extract_json_braces_in_strings() {
        let text = r#"{"reason": "uses {braces} and \"quotes\""}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("{unbalanced"), None);
    }

    #[tokio::test]
    async fn test_prompt_small_model_not_configured() {
        let host = InMemoryHost::new();
        let result = prompt_small_model::<ResultSummary>(
            &host,
            SmallModelOptions {
                prompt: "x".to_string(),
                timeout: Duration::from_secs(1),
                session_title: "t".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(SmallModelError::NotConfigured)));
        // No session should have been created
        assert!(host.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_small_model_parses_and_cleans_up() {
        let host = InMemoryHost::new().with_small_model("small-1");
        host.script_reply(r#"Here you go: {"title": "Done", "description": "All good"}"#);

        let summary: ResultSummary = prompt_small_model(
            &host,
            SmallModelOptions {
                prompt: "summarize".to_string(),
                timeout: Duration::from_secs(1),
                session_title: "Result Summary".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.title, "Done");
        // Temporary session must be deleted even on success
        assert_eq!(host.deleted_sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_small_model_no_reply() {
        let host = InMemoryHost::new().with_small_model("small-1");

        let result = prompt_small_model::<ResultSummary>(
            &host,
            SmallModelOptions {
                prompt: "summarize".to_string(),
                timeout: Duration::from_secs(1),
                session_title: "t".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(SmallModelError::NoText)));
        assert_eq!(host.deleted_sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_result_degrades() {
        let host = InMemoryHost::new();
        assert!(summarize_result(&host, "anything", Duration::from_secs(1))
            .await
            .is_none());
    }
}
