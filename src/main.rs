//! SnapCrew ops CLI
//!
//! Drives the join core against a JSON state-file snapshot of the
//! in-memory store. Meant for local operation and demos; a deployment
//! fronts the same library with its own route handlers.

use clap::{Parser, Subcommand};
use snapcrew::{
    generate_job_id, Job, JobStatus, JoinConfig, JoinManager, JoinStore, MemoryStore, TokenCheck,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snapcrew")]
#[command(about = "SnapCrew join core operations", version)]
struct Cli {
    /// Path to the state snapshot file
    #[arg(long, default_value = "snapcrew_state.json")]
    state: PathBuf,

    /// Path to snapcrew.toml (secret, TTL, retry budget)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        action: JobCommands,
    },

    /// Join token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Create a new job in OPEN status
    New {
        /// Requester who posts the job
        #[arg(long)]
        requester: String,
    },

    /// Show a job's status, or transition it with --set
    Status {
        /// Job identifier
        job_id: String,

        /// Target status (e.g. IN_PROGRESS, CANCELLED)
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Mint a join token for a job
    Issue {
        /// Job identifier
        job_id: String,
    },

    /// Pre-flight a token or short code without consuming it
    Check {
        /// Full token string or 6-digit short code
        identifier: String,
    },

    /// Redeem a token, binding a Helper to the job
    Join {
        /// Full token string or 6-digit short code
        identifier: String,

        /// Helper claiming the job
        #[arg(long)]
        helper: String,
    },

    /// Delete expired tokens
    Gc,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(cli) {
        eprintln!("Error: {message}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = JoinConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    let store = Arc::new(MemoryStore::from_snapshot_file(&cli.state).map_err(|e| e.to_string())?);
    let manager = JoinManager::new(store.clone(), config);

    match cli.command {
        Commands::Job { action } => match action {
            JobCommands::New { requester } => {
                let job = Job::new(generate_job_id(), requester);
                let job_id = job.job_id.clone();
                store.insert_job(job).map_err(|e| e.to_string())?;
                store.snapshot_to_file(&cli.state).map_err(|e| e.to_string())?;
                println!("{job_id}");
            }
            JobCommands::Status { job_id, set } => {
                if let Some(target) = set {
                    let target: JobStatus = target.parse().map_err(|e: snapcrew::TransitionError| e.to_string())?;
                    let job = store
                        .update_job_status(&job_id, target)
                        .map_err(|e| e.to_string())?;
                    store.snapshot_to_file(&cli.state).map_err(|e| e.to_string())?;
                    println!("{}", job.status);
                } else {
                    let job = store
                        .get_job(&job_id)
                        .map_err(|e| e.to_string())?
                        .ok_or_else(|| format!("unknown job: {job_id}"))?;
                    println!("{}", job.status);
                }
            }
        },
        Commands::Token { action } => match action {
            TokenCommands::Issue { job_id } => {
                let issued = manager.issue_token(&job_id).map_err(|e| e.to_string())?;
                store.snapshot_to_file(&cli.state).map_err(|e| e.to_string())?;
                println!("token:      {}", issued.token);
                println!("short code: {}", issued.short_code);
                println!("expires at: {}", issued.expires_at.to_rfc3339());
            }
            TokenCommands::Check { identifier } => {
                match manager.check_token(&identifier).map_err(|e| e.to_string())? {
                    TokenCheck::Valid { job_id } => println!("valid (job {job_id})"),
                    TokenCheck::Invalid { reason } => println!("invalid: {reason}"),
                }
            }
            TokenCommands::Join { identifier, helper } => {
                match manager
                    .consume_token(&identifier, &helper)
                    .map_err(|e| e.to_string())?
                {
                    Some(assignment) => {
                        store.snapshot_to_file(&cli.state).map_err(|e| e.to_string())?;
                        println!("joined job {} as {}", assignment.job_id, assignment.helper_id);
                    }
                    None => {
                        println!("could not join: token invalid, expired, or job already taken");
                    }
                }
            }
            TokenCommands::Gc => {
                let removed = manager.purge_expired().map_err(|e| e.to_string())?;
                store.snapshot_to_file(&cli.state).map_err(|e| e.to_string())?;
                println!("removed {removed} expired tokens");
            }
        },
    }

    Ok(())
}
