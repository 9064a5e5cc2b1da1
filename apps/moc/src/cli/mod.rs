//! # MOC CLI Module
//!
//! Command-line interface over a single request document.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Open a request from an intake file
//! - `status` - Show the request and its stage progress
//! - `complete` / `reject` / `reopen` - Drive the in-progress task
//! - `annotate` - Comment on or attach files to the active task
//! - `approve` - Record a decision on an approval row
//! - `action` - Cancel, change champion or team, extend
//! - `risk` - Assess a severity/probability pair

mod commands;

use crate::config::MocConfig;
use clap::{Parser, Subcommand};
use moc_core::{ApprovalStatus, MocError, StageKind, TaskSlot};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// MOC - Management of Change tracker
///
/// Staged, gated approval workflow for plant change requests.
#[derive(Parser, Debug)]
#[command(name = "moc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the request document
    #[arg(short, long, global = true, default_value = "moc-request.bin")]
    pub document: PathBuf,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "moc.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Address of a task on the command line.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct TaskArgs {
    /// Stage (initiation, review, implementation, closeout)
    #[arg(short, long)]
    pub stage: StageKind,

    /// Task ordinal within the stage
    #[arg(short, long)]
    pub task: usize,
}

impl TaskArgs {
    #[must_use]
    pub fn slot(&self) -> TaskSlot {
        TaskSlot::new(self.stage, self.task)
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Open a new request from an intake TOML file
    Init {
        /// Request id (e.g. MOC-2024-017)
        #[arg(long)]
        id: String,

        /// Path to the intake file
        #[arg(short, long)]
        intake: PathBuf,

        /// Overwrite an existing document
        #[arg(short, long)]
        force: bool,
    },

    /// Show request status
    Status,

    /// Complete the in-progress task
    Complete {
        #[command(flatten)]
        task: TaskArgs,

        /// Task payload as JSON (defaults to the task's current payload)
        #[arg(long)]
        payload: Option<String>,
    },

    /// Reject the in-progress task
    Reject {
        #[command(flatten)]
        task: TaskArgs,

        /// Reason for the rejection
        #[arg(short, long)]
        remark: String,
    },

    /// Reopen a rejected task
    Reopen {
        #[command(flatten)]
        task: TaskArgs,
    },

    /// Add a comment or attachments to the active task
    Annotate {
        #[command(flatten)]
        task: TaskArgs,

        /// Comment text
        #[arg(long, default_value = "")]
        comment: String,

        /// Attachment as CATEGORY=FILE (repeatable)
        #[arg(short, long)]
        attach: Vec<String>,
    },

    /// Record a decision on an approval row
    Approve {
        /// Row id (the discipline id)
        #[arg(long)]
        row: String,

        /// approved or rejected; omit to clear the decision
        #[arg(long)]
        status: Option<ApprovalStatus>,

        /// Remark for the decision
        #[arg(short, long, default_value = "")]
        remark: String,
    },

    /// Request-level side actions
    Action {
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Assess a risk pair on the matrix
    Risk {
        /// Severity (1-4)
        #[arg(short, long)]
        severity: Option<u8>,

        /// Probability (1-4, shown as A-D)
        #[arg(short, long)]
        probability: Option<u8>,

        /// Print the full matrix
        #[arg(short, long)]
        matrix: bool,
    },
}

/// Side actions.
#[derive(Subcommand, Debug)]
pub enum ActionCommand {
    /// Cancel the request
    Cancel {
        #[arg(short, long)]
        reason: String,
    },

    /// Hand the request to a new champion
    Champion {
        #[arg(long)]
        person: String,

        #[arg(short, long)]
        reason: String,
    },

    /// Replace a team role holder
    Team {
        #[arg(long)]
        role: String,

        #[arg(long)]
        person: String,

        #[arg(short, long)]
        reason: String,
    },

    /// Extend a temporary change
    Extend {
        #[arg(long)]
        end_date: String,

        #[arg(short, long)]
        reason: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MocError> {
    let config = MocConfig::load(&cli.config)?;
    let document = cli.document.as_path();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, host, port).await,
        Some(Commands::Init { id, intake, force }) => {
            cmd_init(document, &config, json_mode, &id, &intake, force)
        }
        Some(Commands::Status) | None => cmd_status(document, json_mode),
        Some(Commands::Complete { task, payload }) => cmd_complete(
            document,
            &config,
            json_mode,
            task.slot(),
            payload.as_deref(),
        ),
        Some(Commands::Reject { task, remark }) => {
            cmd_reject(document, &config, json_mode, task.slot(), &remark)
        }
        Some(Commands::Reopen { task }) => cmd_reopen(document, &config, json_mode, task.slot()),
        Some(Commands::Annotate {
            task,
            comment,
            attach,
        }) => cmd_annotate(document, &config, json_mode, task.slot(), &comment, &attach),
        Some(Commands::Approve {
            row,
            status,
            remark,
        }) => cmd_approve(document, &config, json_mode, &row, status, &remark),
        Some(Commands::Action { action }) => {
            cmd_action(document, &config, json_mode, action.into_side_action())
        }
        Some(Commands::Risk {
            severity,
            probability,
            matrix,
        }) => cmd_risk(json_mode, severity, probability, matrix),
    }
}

impl ActionCommand {
    /// Convert to the engine's side action.
    #[must_use]
    pub fn into_side_action(self) -> moc_core::SideAction {
        use moc_core::{PersonId, SideAction};

        match self {
            ActionCommand::Cancel { reason } => SideAction::Cancel { reason },
            ActionCommand::Champion { person, reason } => SideAction::ChangeChampion {
                champion: PersonId::new(person),
                reason,
            },
            ActionCommand::Team {
                role,
                person,
                reason,
            } => SideAction::ChangeTeam {
                role,
                person: PersonId::new(person),
                reason,
            },
            ActionCommand::Extend { end_date, reason } => SideAction::Extend {
                new_end_date: end_date,
                reason,
            },
        }
    }
}
