// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Background agent delegation.
//!
//! A delegation is a unit of work handed to a background session, tracked
//! independently of the conversation that requested it:
//!
//! ```text
//! pending ──▶ running ──▶ completed
//!                 │  ╲──▶ failed
//!                 │  ╲──▶ cancelled
//!                 ╲────▶ timeout
//! ```
//!
//! - **Records** ([`types`]): one durable JSON file per delegation plus a
//!   markdown summary, under the project's `delegations/` directory.
//! - **State machine** ([`manager`]): fire-and-forget dispatch, idle-signal
//!   completion, one-shot timeouts, cooperative cancellation.
//! - **Notifications** ([`notification`]): per-root-session batching so N
//!   parallel delegations interrupt the requesting conversation once.

mod manager;
mod notification;
mod types;

pub use manager::{resolve_root_session, DelegationManager};
pub use notification::{
    render_all_complete, render_notification, render_remaining_note, render_running_context,
    status_word,
};
pub use types::{
    denied_tools_set, is_denied_tool, CreateDelegationOptions, Delegation, DelegationConfig,
    DelegationStatus, ListDelegationOptions, DELEGATED_DENIED_TOOLS,
};
