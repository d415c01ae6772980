// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The delegation state machine.
//!
//! Delegations run detached from the conversation that requested them:
//! `create` persists a record, opens a background session, fires the prompt
//! without waiting, and returns. Completion arrives later as an idle signal
//! from the host's event stream; timeouts fire from a one-shot timer armed
//! at start. Every terminal transition flows through the same notification
//! path, which batches results per root session so N parallel delegations
//! interrupt the root conversation once, not N times.
//!
//! The JSON records on disk are the source of truth. The session index and
//! per-root pending sets are in-memory caches; [`rehydrate`] rebuilds them
//! from the store after a restart.
//!
//! [`rehydrate`]: DelegationManager::rehydrate

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::{summarize_result, AgentSelector};
use crate::host::{CreateSessionRequest, HostClient, PromptRequest};
use crate::types::{MessageItem, Role};

use super::notification::{render_all_complete, render_notification, render_remaining_note};
use super::types::{
    CreateDelegationOptions, Delegation, DelegationConfig, DelegationStatus,
    ListDelegationOptions, DELEGATED_DENIED_TOOLS,
};
use crate::error::DelegationError;

/// Marker appended to partial results when a delegation times out.
const TIMEOUT_MARKER: &str = "[TIMEOUT REACHED - PARTIAL RESULT]";

/// Fallback description length when the small model is unavailable.
const FALLBACK_DESCRIPTION_CHARS: usize = 200;

/// Manages background agent delegations for one project.
pub struct DelegationManager {
    delegations_dir: PathBuf,
    host: Option<Arc<dyn HostClient>>,
    selector: Option<AgentSelector>,
    config: DelegationConfig,
    /// session id -> delegation id, for idle-signal routing.
    session_index: RwLock<HashMap<String, String>>,
    /// root session id -> delegation ids still outstanding.
    pending_roots: RwLock<HashMap<String, HashSet<String>>>,
}

impl DelegationManager {
    /// Create a manager storing records under `<project_dir>/delegations/`.
    ///
    /// Without a host, delegations stay `pending` and transitions happen
    /// only through explicit `complete`/`fail`/`cancel` calls.
    pub fn new(
        project_dir: impl AsRef<Path>,
        host: Option<Arc<dyn HostClient>>,
        config: DelegationConfig,
    ) -> Self {
        let selector = host
            .clone()
            .map(|h| AgentSelector::new(h, config.small_model_timeout));

        Self {
            delegations_dir: project_dir.as_ref().join("delegations"),
            host,
            selector,
            config,
            session_index: RwLock::new(HashMap::new()),
            pending_roots: RwLock::new(HashMap::new()),
        }
    }

    /// Directory holding the delegation records.
    pub fn delegations_dir(&self) -> &Path {
        &self.delegations_dir
    }

    /// Create a new delegation.
    ///
    /// The record is persisted as `pending` first. With a host configured,
    /// the backing session is created and the prompt dispatched
    /// fire-and-forget before this returns; the returned record reflects
    /// the state at dispatch time (`running`, or `failed` when the session
    /// could not be created).
    pub async fn create(
        self: &Arc<Self>,
        project_id: &str,
        options: CreateDelegationOptions,
    ) -> Result<Delegation, DelegationError> {
        let id = generate_id();

        let mut delegation = Delegation {
            id: id.clone(),
            project_id: project_id.to_string(),
            issue_id: options.issue_id.clone(),
            worktree_path: options.worktree_path.clone(),
            worktree_branch: options.worktree_branch.clone(),
            vcs: options.vcs,
            status: DelegationStatus::Pending,
            session_id: None,
            parent_session_id: options.parent_session_id.clone(),
            root_session_id: None,
            agent: options.agent.clone(),
            prompt: options.prompt.clone(),
            title: None,
            description: None,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        self.save(&delegation).await?;
        info!("Created delegation {} for issue {}", id, options.issue_id);

        let Some(host) = self.host.clone() else {
            return Ok(delegation);
        };

        // Resolve the notification destination once, at creation time
        if let Some(parent) = &delegation.parent_session_id {
            delegation.root_session_id =
                Some(resolve_root_session(host.as_ref(), parent).await);
        }

        if delegation.agent.is_none() {
            if let Some(selector) = &self.selector {
                let agents = selector.discover_agents().await;
                delegation.agent = selector
                    .select_agent(&agents, &delegation.prompt, None)
                    .await;
            }
        }

        // Register before any terminal path can run, so a failed start
        // still produces a correctly batched notification
        if let Some(root) = delegation.root_session_id.clone() {
            self.pending_roots
                .write()
                .await
                .entry(root)
                .or_default()
                .insert(id.clone());
        }

        let mut session_request =
            CreateSessionRequest::titled(format!("Delegation: {}", delegation.issue_id));
        session_request.parent_id = delegation.parent_session_id.clone();
        session_request.agent = delegation.agent.clone();

        match host.create_session(session_request).await {
            Ok(session) => {
                delegation.session_id = Some(session.id.clone());
                delegation.status = DelegationStatus::Running;
                self.save(&delegation).await?;

                self.session_index
                    .write()
                    .await
                    .insert(session.id.clone(), id.clone());

                // Fire-and-forget: do not wait for the prompt to produce
                // output. A rejected dispatch fails the delegation.
                let manager = Arc::clone(self);
                let dispatch_host = host.clone();
                let prompt = build_prompt(&delegation);
                let session_id = session.id.clone();
                let delegation_id = id.clone();
                tokio::spawn(async move {
                    let request = PromptRequest::text(prompt)
                        .with_disabled_tools(DELEGATED_DENIED_TOOLS.iter().copied());
                    if let Err(e) = dispatch_host.prompt(&session_id, request).await {
                        error!(
                            "Prompt dispatch for delegation {} failed: {}",
                            delegation_id, e
                        );
                        manager.fail(&delegation_id, &e.to_string()).await;
                    }
                });

                // One-shot timer; the handler no-ops once terminal, so the
                // timer is never cancelled on early completion
                let timeout = options.timeout.unwrap_or(self.config.timeout);
                let manager = Arc::clone(self);
                let delegation_id = id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    manager.handle_timeout(&delegation_id).await;
                });
            }
            Err(e) => {
                error!("Failed to start delegation {}: {}", id, e);
                delegation.status = DelegationStatus::Failed;
                delegation.error = Some(e.to_string());
                delegation.completed_at = Some(Utc::now());
                self.save(&delegation).await?;
                self.persist_summary(&delegation).await;
                self.notify_terminal(&delegation).await;
            }
        }

        Ok(delegation)
    }

    /// Get a delegation by id. Missing or corrupt records read as `None`.
    pub async fn get(&self, delegation_id: &str) -> Option<Delegation> {
        let path = self.delegations_dir.join(format!("{delegation_id}.json"));
        let content = tokio::fs::read_to_string(path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    /// List delegations, optionally filtered, sorted most recent first.
    pub async fn list(&self, options: ListDelegationOptions) -> Vec<Delegation> {
        let mut delegations = Vec::new();

        if let Ok(mut entries) = tokio::fs::read_dir(&self.delegations_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(content) = tokio::fs::read_to_string(&path).await {
                    if let Ok(delegation) = serde_json::from_str::<Delegation>(&content) {
                        delegations.push(delegation);
                    }
                }
            }
        }

        if let Some(status) = options.status {
            delegations.retain(|d| d.status == status);
        }
        if let Some(issue_id) = &options.issue_id {
            delegations.retain(|d| &d.issue_id == issue_id);
        }

        delegations.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        delegations
    }

    /// Mark a delegation completed with a result.
    ///
    /// Returns `false` for unknown ids and for delegations already in a
    /// terminal state.
    pub async fn complete(&self, delegation_id: &str, result: &str) -> bool {
        let Some(mut delegation) = self.get(delegation_id).await else {
            return false;
        };
        if delegation.is_terminal() {
            return false;
        }

        delegation.status = DelegationStatus::Completed;
        delegation.result = Some(result.to_string());
        delegation.completed_at = Some(Utc::now());

        self.save_or_warn(&delegation).await;
        self.persist_summary(&delegation).await;
        info!("Delegation {} completed", delegation_id);
        self.notify_terminal(&delegation).await;

        true
    }

    /// Mark a delegation failed with an error.
    pub async fn fail(&self, delegation_id: &str, error: &str) -> bool {
        let Some(mut delegation) = self.get(delegation_id).await else {
            return false;
        };
        if delegation.is_terminal() {
            return false;
        }

        delegation.status = DelegationStatus::Failed;
        delegation.error = Some(error.to_string());
        delegation.completed_at = Some(Utc::now());

        self.save_or_warn(&delegation).await;
        self.persist_summary(&delegation).await;
        warn!("Delegation {} failed: {}", delegation_id, error);
        self.notify_terminal(&delegation).await;

        true
    }

    /// Cancel a delegation that is still outstanding.
    ///
    /// Cancellation is cooperative: the backing session is deleted
    /// best-effort, and a deletion failure does not block the local
    /// transition. Finished delegations cannot be cancelled (`false`).
    pub async fn cancel(&self, delegation_id: &str) -> bool {
        let Some(mut delegation) = self.get(delegation_id).await else {
            return false;
        };
        if delegation.is_terminal() {
            return false;
        }

        if let (Some(host), Some(session_id)) = (&self.host, &delegation.session_id) {
            if let Err(e) = host.delete_session(session_id).await {
                warn!("Failed to delete session for cancelled delegation: {}", e);
            }
        }

        delegation.status = DelegationStatus::Cancelled;
        delegation.completed_at = Some(Utc::now());

        self.save_or_warn(&delegation).await;
        self.persist_summary(&delegation).await;
        info!("Delegation {} cancelled", delegation_id);
        self.notify_terminal(&delegation).await;

        true
    }

    /// Handle an idle signal for a backing session.
    ///
    /// Unknown sessions and delegations no longer `running` are ignored,
    /// which makes duplicate and late signals harmless. Returns whether a
    /// completion was processed.
    pub async fn handle_session_idle(&self, session_id: &str) -> bool {
        let Some(delegation_id) = self.find_by_session(session_id).await else {
            debug!("Idle signal for unknown session {}", session_id);
            return false;
        };
        let Some(mut delegation) = self.get(&delegation_id).await else {
            return false;
        };
        if delegation.status != DelegationStatus::Running {
            debug!(
                "Ignoring idle signal for delegation {} in status {}",
                delegation_id, delegation.status
            );
            return false;
        }
        let Some(host) = self.host.clone() else {
            return false;
        };

        let result = match host.messages(session_id).await {
            Ok(messages) => extract_result_text(&messages),
            Err(e) => {
                warn!(
                    "Failed to fetch messages for delegation {}: {}",
                    delegation_id, e
                );
                String::new()
            }
        };

        if !result.is_empty() {
            match summarize_result(host.as_ref(), &result, self.config.small_model_timeout).await
            {
                Some(summary) => {
                    delegation.title = Some(summary.title);
                    delegation.description = Some(summary.description);
                }
                None => {
                    delegation.title = fallback_title(&result);
                    delegation.description = fallback_description(&result);
                }
            }
        }

        delegation.status = DelegationStatus::Completed;
        delegation.result = (!result.is_empty()).then_some(result);
        delegation.completed_at = Some(Utc::now());

        self.save_or_warn(&delegation).await;
        self.persist_summary(&delegation).await;
        info!("Delegation {} completed", delegation_id);
        self.notify_terminal(&delegation).await;

        true
    }

    /// Timeout handler armed at delegation start.
    ///
    /// No-ops unless the delegation is still `running` (the timer is never
    /// cancelled, so most firings arrive after completion).
    pub async fn handle_timeout(&self, delegation_id: &str) {
        let Some(mut delegation) = self.get(delegation_id).await else {
            return;
        };
        if delegation.status != DelegationStatus::Running {
            debug!(
                "Timeout timer fired for delegation {} in status {}; ignoring",
                delegation_id, delegation.status
            );
            return;
        }

        let mut result = String::new();
        if let (Some(host), Some(session_id)) = (&self.host, &delegation.session_id) {
            if let Ok(messages) = host.messages(session_id).await {
                result = extract_result_text(&messages);
            }

            if let Err(e) = host.delete_session(session_id).await {
                warn!("Failed to delete session for timed-out delegation: {}", e);
            }
        }

        if !result.is_empty() {
            result.push_str("\n\n");
        }
        result.push_str(TIMEOUT_MARKER);

        delegation.status = DelegationStatus::Timeout;
        delegation.result = Some(result);
        delegation.completed_at = Some(Utc::now());

        self.save_or_warn(&delegation).await;
        self.persist_summary(&delegation).await;
        warn!("Delegation {} timed out", delegation_id);
        self.notify_terminal(&delegation).await;
    }

    /// Check if all delegations for an issue are finished.
    pub async fn are_all_complete(&self, issue_id: &str) -> bool {
        let delegations = self
            .list(ListDelegationOptions {
                issue_id: Some(issue_id.to_string()),
                ..Default::default()
            })
            .await;

        delegations.iter().all(Delegation::is_terminal)
    }

    /// Get pending/running delegations for an issue.
    pub async fn get_active_delegations(&self, issue_id: &str) -> Vec<Delegation> {
        self.list(ListDelegationOptions {
            issue_id: Some(issue_id.to_string()),
            ..Default::default()
        })
        .await
        .into_iter()
        .filter(|d| d.status.is_active())
        .collect()
    }

    /// Get all currently running delegations.
    pub async fn get_running_delegations(&self) -> Vec<Delegation> {
        self.list(ListDelegationOptions {
            status: Some(DelegationStatus::Running),
            ..Default::default()
        })
        .await
    }

    /// Find the delegation backed by a session.
    ///
    /// Checks the in-memory index first and falls back to scanning the
    /// durable store, so lookups survive a restart.
    pub async fn find_by_session(&self, session_id: &str) -> Option<String> {
        if let Some(id) = self.session_index.read().await.get(session_id) {
            return Some(id.clone());
        }

        let found = self
            .list(ListDelegationOptions::default())
            .await
            .into_iter()
            .find(|d| d.session_id.as_deref() == Some(session_id))?;

        self.session_index
            .write()
            .await
            .insert(session_id.to_string(), found.id.clone());
        Some(found.id)
    }

    /// Rebuild the in-memory caches from the durable store.
    ///
    /// Call after a restart: the session index and per-root pending sets
    /// are derived from the non-terminal records on disk.
    pub async fn rehydrate(&self) {
        let delegations = self.list(ListDelegationOptions::default()).await;

        let mut index = self.session_index.write().await;
        let mut roots = self.pending_roots.write().await;
        index.clear();
        roots.clear();

        for delegation in delegations.iter().filter(|d| !d.is_terminal()) {
            if let Some(session_id) = &delegation.session_id {
                index.insert(session_id.clone(), delegation.id.clone());
            }
            if let Some(root) = &delegation.root_session_id {
                roots
                    .entry(root.clone())
                    .or_default()
                    .insert(delegation.id.clone());
            }
        }
    }

    /// Number of delegations still outstanding for a root session.
    pub async fn outstanding_for_root(&self, root_session_id: &str) -> usize {
        self.pending_roots
            .read()
            .await
            .get(root_session_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Persist a delegation record.
    async fn save(&self, delegation: &Delegation) -> Result<(), DelegationError> {
        tokio::fs::create_dir_all(&self.delegations_dir).await?;

        let path = self.delegations_dir.join(format!("{}.json", delegation.id));
        let json = serde_json::to_string_pretty(delegation)
            .map_err(|e| DelegationError::SaveFailed(e.to_string()))?;
        tokio::fs::write(path, json).await?;

        Ok(())
    }

    async fn save_or_warn(&self, delegation: &Delegation) {
        if let Err(e) = self.save(delegation).await {
            warn!("Failed to save delegation {}: {}", delegation.id, e);
        }
    }

    /// Write the human-readable markdown summary next to the record.
    async fn persist_summary(&self, delegation: &Delegation) {
        let path = self.delegations_dir.join(format!("{}.md", delegation.id));
        if let Err(e) = tokio::fs::write(path, render_summary(delegation)).await {
            warn!(
                "Failed to write summary for delegation {}: {}",
                delegation.id, e
            );
        }
    }

    /// Batched terminal notification to the root session.
    ///
    /// While other delegations for the same root remain outstanding, the
    /// result block goes out silent; the last one triggers a reply and is
    /// followed by a distinct all-complete summary.
    async fn notify_terminal(&self, delegation: &Delegation) {
        if let Some(session_id) = &delegation.session_id {
            self.session_index.write().await.remove(session_id);
        }

        let (Some(host), Some(root)) = (self.host.clone(), delegation.root_session_id.clone())
        else {
            return;
        };

        let remaining = {
            let mut roots = self.pending_roots.write().await;
            match roots.get_mut(&root) {
                Some(set) => {
                    set.remove(&delegation.id);
                    let len = set.len();
                    if len == 0 {
                        roots.remove(&root);
                    }
                    len
                }
                None => 0,
            }
        };

        let block = render_notification(delegation);

        if remaining > 0 {
            let text = format!("{block}\n\n{}", render_remaining_note(remaining));
            if let Err(e) = host.prompt(&root, PromptRequest::text(text).silent()).await {
                warn!("Failed to notify root session {}: {}", root, e);
            }
        } else {
            if let Err(e) = host.prompt(&root, PromptRequest::text(block)).await {
                warn!("Failed to notify root session {}: {}", root, e);
            }
            if let Err(e) = host
                .prompt(&root, PromptRequest::text(render_all_complete()))
                .await
            {
                warn!("Failed to send all-complete summary to {}: {}", root, e);
            }
        }
    }
}

/// Generate a unique delegation id: time-based prefix plus random suffix.
fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("del-{}-{}", to_base36(millis), &suffix[..8])
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

/// Walk the parent-session chain to its root.
///
/// A visited set guards against cycles in malformed session graphs; lookup
/// failures stop the walk at the last known id.
pub async fn resolve_root_session(host: &dyn HostClient, session_id: &str) -> String {
    let mut visited = HashSet::new();
    let mut current = session_id.to_string();

    loop {
        if !visited.insert(current.clone()) {
            warn!("Cycle in parent-session chain at {}", current);
            return current;
        }

        match host.get_session(&current).await {
            Ok(Some(session)) => match session.parent_id {
                Some(parent) => current = parent,
                None => return current,
            },
            _ => return current,
        }
    }
}

/// Join the text of non-errored assistant messages.
///
/// Messages flagged as aborted/erroneous are skipped, not concatenated.
fn extract_result_text(messages: &[MessageItem]) -> String {
    messages
        .iter()
        .filter(|m| m.info.role == Role::Assistant && m.info.error.is_none())
        .map(MessageItem::text)
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fallback_title(result: &str) -> Option<String> {
    let line = result.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn fallback_description(result: &str) -> Option<String> {
    let description: String = result.chars().take(FALLBACK_DESCRIPTION_CHARS).collect();
    (!description.is_empty()).then_some(description)
}

/// Build the full prompt for a delegated session.
fn build_prompt(delegation: &Delegation) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("# Delegated Task: {}", delegation.issue_id));
    lines.push(String::new());
    lines.push(format!("**Project:** {}", delegation.project_id));
    lines.push(format!("**Delegation ID:** {}", delegation.id));

    if let Some(path) = &delegation.worktree_path {
        lines.push(format!("**Worktree:** {}", path.display()));
        lines.push(String::new());
        lines.push("You are working in an isolated worktree. Make your changes there.".to_string());
    }

    lines.push(String::new());
    lines.push("## Task".to_string());
    lines.push(String::new());
    lines.push(delegation.prompt.clone());
    lines.push(String::new());
    lines.push("## Instructions".to_string());
    lines.push(String::new());
    lines.push("1. Complete the task described above".to_string());
    lines.push("2. Commit your changes with clear commit messages".to_string());
    lines.push("3. Provide a summary of what you accomplished".to_string());
    lines.push(String::new());
    lines.push("## Restrictions".to_string());
    lines.push(String::new());
    lines.push(
        "- Do not create, update, claim, or close projects or issues; \
         the coordinating session owns project state."
            .to_string(),
    );
    lines.push("- Do not delegate further work or spawn background sessions.".to_string());

    lines.join("\n")
}

/// Render the markdown result summary.
fn render_summary(delegation: &Delegation) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("# Delegation: {}", delegation.issue_id));
    lines.push(String::new());
    lines.push("| Field | Value |".to_string());
    lines.push("| --- | --- |".to_string());
    lines.push(format!("| ID | {} |", delegation.id));
    lines.push(format!("| Project | {} |", delegation.project_id));
    lines.push(format!("| Issue | {} |", delegation.issue_id));
    lines.push(format!("| Status | {} |", delegation.status));
    lines.push(format!("| Started | {} |", delegation.started_at.to_rfc3339()));
    lines.push(format!(
        "| Completed | {} |",
        delegation
            .completed_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "N/A".to_string())
    ));
    if let Some(agent) = &delegation.agent {
        lines.push(format!("| Agent | {agent} |"));
    }
    if let Some(path) = &delegation.worktree_path {
        lines.push(format!("| Worktree | {} |", path.display()));
    }

    lines.push(String::new());
    lines.push("## Prompt".to_string());
    lines.push(String::new());
    lines.push(delegation.prompt.clone());

    if let Some(result) = &delegation.result {
        lines.push(String::new());
        lines.push("## Result".to_string());
        lines.push(String::new());
        lines.push(result.clone());
    }

    if let Some(error) = &delegation.error {
        lines.push(String::new());
        lines.push("## Error".to_string());
        lines.push(String::new());
        lines.push(error.clone());
    }

    lines.push(String::new());
    lines.join("\n")
}
