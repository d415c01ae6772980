// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gaffer main entry point - CLI over worktrees and delegations.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

use gaffer::config::{self, CliOptions};
use gaffer::delegation::{
    CreateDelegationOptions, DelegationConfig, DelegationManager, DelegationStatus,
    ListDelegationOptions,
};
use gaffer::host::{HostClient, HttpHostClient};
use gaffer::telemetry::{init_telemetry, TelemetryConfig};
use gaffer::vcs::MergeStrategy;
use gaffer::worktree::{CreateWorktreeOptions, MergeWorktreeOptions, WorktreeManager};

/// Gaffer - background agent delegation with VCS worktree isolation.
#[derive(Parser)]
#[command(name = "gaffer")]
#[command(author, version, about = "Background agent delegation with VCS worktree isolation", long_about = None)]
struct Cli {
    /// Repository root
    #[arg(short, long, env = "GAFFER_REPO", default_value = ".")]
    repo: PathBuf,

    /// Project directory holding delegation records
    #[arg(short, long, env = "GAFFER_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Base URL of the host session RPC
    #[arg(long, env = "GAFFER_HOST_URL")]
    host_url: Option<String>,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for gaffer.
#[derive(Subcommand)]
enum Commands {
    /// Manage isolated worktrees
    Worktree {
        #[command(subcommand)]
        action: WorktreeAction,
    },

    /// Inspect and manage delegations
    Delegation {
        #[command(subcommand)]
        action: DelegationAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum WorktreeAction {
    /// List worktrees, optionally scoped to a project
    List {
        /// Project id to filter by
        #[arg(long)]
        project: Option<String>,
    },

    /// Create an isolated worktree for an issue
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        issue: String,
        /// Branch to base the worktree on
        #[arg(long)]
        base: Option<String>,
    },

    /// Merge a worktree back and clean it up
    Merge {
        /// Worktree name (project/issue)
        name: String,
        /// Target branch (defaults to the repo's default branch)
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_enum, default_value = "squash")]
        strategy: Strategy,
        /// Keep the worktree after a successful merge
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Remove a worktree without merging
    Remove {
        /// Worktree name (project/issue)
        name: String,
    },
}

#[derive(Subcommand)]
enum DelegationAction {
    /// List delegations
    List {
        /// Filter by issue id
        #[arg(long)]
        issue: Option<String>,
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<Status>,
    },

    /// Show one delegation in full
    Show { id: String },

    /// Create a delegation
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        issue: String,
        #[arg(long)]
        prompt: String,
        /// Pin a specific agent identity
        #[arg(long)]
        agent: Option<String>,
        /// Requesting session (enables completion notifications)
        #[arg(long)]
        parent_session: Option<String>,
        /// Run the work in an isolated worktree
        #[arg(long)]
        worktree: bool,
    },

    /// Cancel an outstanding delegation
    Cancel { id: String },
}

/// Merge strategy argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Squash,
    Merge,
    Rebase,
}

impl From<Strategy> for MergeStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Squash => MergeStrategy::Squash,
            Strategy::Merge => MergeStrategy::Merge,
            Strategy::Rebase => MergeStrategy::Rebase,
        }
    }
}

/// Delegation status argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Status {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl From<Status> for DelegationStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Pending => DelegationStatus::Pending,
            Status::Running => DelegationStatus::Running,
            Status::Completed => DelegationStatus::Completed,
            Status::Failed => DelegationStatus::Failed,
            Status::Cancelled => DelegationStatus::Cancelled,
            Status::Timeout => DelegationStatus::Timeout,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    let _guard = init_telemetry(&TelemetryConfig::default().with_level(level))?;

    let resolved = config::load_config(
        &cli.repo,
        CliOptions {
            host_url: cli.host_url.clone(),
            delegation_timeout_ms: None,
        },
    )?;

    match cli.command {
        Commands::Worktree { action } => {
            let manager = match &resolved.worktree_base_path {
                Some(base) => WorktreeManager::new(&cli.repo).with_base_path(base.clone()),
                None => WorktreeManager::new(&cli.repo),
            };
            run_worktree(action, &manager).await?;
        }
        Commands::Delegation { action } => {
            let host: Option<Arc<dyn HostClient>> = match &resolved.host_url {
                Some(url) => Some(Arc::new(HttpHostClient::new(url.clone())?)),
                None => None,
            };
            let manager = Arc::new(DelegationManager::new(
                &cli.project_dir,
                host,
                DelegationConfig::from(&resolved),
            ));
            manager.rehydrate().await;

            let worktrees = match &resolved.worktree_base_path {
                Some(base) => WorktreeManager::new(&cli.repo).with_base_path(base.clone()),
                None => WorktreeManager::new(&cli.repo),
            };
            run_delegation(action, &manager, &worktrees).await?;
        }
        Commands::Version => {
            println!("gaffer {}", gaffer::VERSION);
        }
    }

    Ok(())
}

async fn run_worktree(action: WorktreeAction, manager: &WorktreeManager) -> anyhow::Result<()> {
    match action {
        WorktreeAction::List { project } => {
            let worktrees = match project {
                Some(project) => manager.list_project_worktrees(&project).await,
                None => manager.list_all_worktrees().await,
            };

            if worktrees.is_empty() {
                println!("No worktrees found");
                return Ok(());
            }

            for wt in worktrees {
                let main = if wt.is_main { " (main)" } else { "" };
                let branch = wt.branch.as_deref().unwrap_or("-");
                println!("{}  {}  {}{}", wt.name, branch, wt.path.display(), main);
            }
        }

        WorktreeAction::Create {
            project,
            issue,
            base,
        } => {
            let created = manager
                .create_isolated_worktree(&CreateWorktreeOptions {
                    project_id: project,
                    issue_id: issue,
                    base_branch: base,
                })
                .await;

            match created {
                Some(info) => println!("Created worktree {} at {}", info.name, info.path.display()),
                None => anyhow::bail!("Failed to create worktree (is this a git or jj repository?)"),
            }
        }

        WorktreeAction::Merge {
            name,
            target,
            strategy,
            no_cleanup,
        } => {
            let result = manager
                .merge_and_cleanup(
                    &name,
                    MergeWorktreeOptions {
                        target_branch: target,
                        strategy: strategy.into(),
                        cleanup: !no_cleanup,
                    },
                )
                .await;

            if result.success {
                println!(
                    "Merged {} ({})",
                    name,
                    result.commit_id.as_deref().unwrap_or("unknown commit")
                );
            } else if !result.conflict_files.is_empty() {
                eprintln!("Merge conflicts detected; resolve manually and retry:");
                for file in &result.conflict_files {
                    eprintln!("  {file}");
                }
                anyhow::bail!("merge conflicted");
            } else {
                anyhow::bail!(
                    "merge failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        WorktreeAction::Remove { name } => {
            if manager.remove_worktree(&name).await {
                println!("Removed worktree {name}");
            } else {
                anyhow::bail!("Failed to remove worktree {name}");
            }
        }
    }

    Ok(())
}

async fn run_delegation(
    action: DelegationAction,
    manager: &Arc<DelegationManager>,
    worktrees: &WorktreeManager,
) -> anyhow::Result<()> {
    match action {
        DelegationAction::List { issue, status } => {
            let delegations = manager
                .list(ListDelegationOptions {
                    status: status.map(Into::into),
                    issue_id: issue,
                })
                .await;

            if delegations.is_empty() {
                println!("No delegations found");
                return Ok(());
            }

            for d in delegations {
                println!(
                    "{}  {}  {}  {}",
                    d.id,
                    d.status,
                    d.issue_id,
                    d.title.as_deref().unwrap_or("-")
                );
            }
        }

        DelegationAction::Show { id } => match manager.get(&id).await {
            Some(delegation) => {
                println!("{}", serde_json::to_string_pretty(&delegation)?);
            }
            None => anyhow::bail!("Delegation {id} not found"),
        },

        DelegationAction::Create {
            project,
            issue,
            prompt,
            agent,
            parent_session,
            worktree,
        } => {
            let mut options = CreateDelegationOptions::new(issue.clone(), prompt);
            options.agent = agent;
            options.parent_session_id = parent_session;

            if worktree {
                let created = worktrees
                    .create_isolated_worktree(&CreateWorktreeOptions {
                        project_id: project.clone(),
                        issue_id: issue,
                        base_branch: None,
                    })
                    .await;

                match (created, worktrees.vcs_kind()) {
                    (Some(info), Some(kind)) => {
                        println!("Created worktree {} at {}", info.name, info.path.display());
                        options = options.with_worktree(info.path, info.branch, kind);
                    }
                    _ => eprintln!("No VCS detected; delegating without isolation"),
                }
            }

            let delegation = manager.create(&project, options).await?;
            println!("Created delegation {} ({})", delegation.id, delegation.status);
        }

        DelegationAction::Cancel { id } => {
            if manager.cancel(&id).await {
                println!("Cancelled delegation {id}");
            } else {
                anyhow::bail!("Delegation {id} not found or already finished");
            }
        }
    }

    Ok(())
}
