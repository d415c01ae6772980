// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for notification rendering.
//!
//! Run with: `cargo bench --bench notification`

use std::hint::black_box;
use std::path::PathBuf;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use gaffer::delegation::{render_notification, render_running_context, Delegation, DelegationStatus};
use gaffer::vcs::VcsKind;

fn sample_delegation(result_len: usize) -> Delegation {
    Delegation {
        id: "del-abc123-deadbeef".to_string(),
        project_id: "benchmark-project".to_string(),
        issue_id: "issue-42".to_string(),
        worktree_path: Some(PathBuf::from(
            "/work/benchmark-project-worktrees/benchmark-project/issue-42",
        )),
        worktree_branch: Some("benchmark-project-issue-42".to_string()),
        vcs: Some(VcsKind::Git),
        status: DelegationStatus::Completed,
        session_id: Some("ses-99".to_string()),
        parent_session_id: Some("ses-1".to_string()),
        root_session_id: Some("ses-root".to_string()),
        agent: Some("coder".to_string()),
        prompt: "Implement the feature and add tests".to_string(),
        title: Some("Feature implemented".to_string()),
        description: Some("Added the feature with full test coverage".to_string()),
        result: Some("line of result text\n".repeat(result_len / 20)),
        error: None,
        started_at: Utc::now(),
        completed_at: Some(Utc::now()),
    }
}

fn bench_render_notification(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_notification");

    for size in [200usize, 2_000, 20_000] {
        let delegation = sample_delegation(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("result_{size}b"), |b| {
            b.iter(|| render_notification(black_box(&delegation)))
        });
    }

    group.finish();
}

fn bench_render_running_context(c: &mut Criterion) {
    let delegations: Vec<Delegation> = (0..8).map(|_| sample_delegation(200)).collect();

    c.bench_function("render_running_context_8", |b| {
        b.iter(|| render_running_context(black_box(&delegations)))
    });
}

criterion_group!(benches, bench_render_notification, bench_render_running_context);
criterion_main!(benches);
