// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent discovery and selection.
//!
//! Delegated work can run as a specific agent identity. This module asks the
//! host which identities exist, and uses the auxiliary small model to pick
//! the best match for a task description. Both concerns degrade to "let the
//! host decide" on any failure.

mod selector;
mod small_model;

pub use selector::{AgentSelector, TaskType};
pub use small_model::{
    extract_json, prompt_small_model, summarize_result, ResultSummary, SmallModelError,
    SmallModelOptions,
};
