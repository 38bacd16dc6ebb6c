//! pmassist CLI: the main entry point.
//!
//! Commands:
//! - `init`     Write a starter config
//! - `serve`    Start the HTTP gateway
//! - `ask`      Ask one question as a given tenant/user
//! - `history`  List a user's root sessions
//! - `seed`     Load users/projects/tasks from a JSON fixture
//! - `status`   Show the effective config and active generator

use clap::{Parser, Subcommand};
use pmassist_assistant::{HistoryQuery, QueryRequest};
use pmassist_core::ids::{ProjectId, SessionId, TenantId, UserId};
use pmassist_core::model::Principal;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "pmassist",
    about = "pmassist: project assistant with a conversational query pipeline",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question and print the answer with its sources
    Ask {
        #[arg(long, env = "PMASSIST_TENANT")]
        tenant: TenantId,

        #[arg(long, env = "PMASSIST_USER")]
        user: UserId,

        /// Scope the question to one project
        #[arg(long)]
        project: Option<ProjectId>,

        /// Ask as a follow-up to this session
        #[arg(long)]
        parent: Option<SessionId>,

        /// Leave recent conversation out of the prompt
        #[arg(long)]
        no_history: bool,

        question: String,
    },

    /// List root sessions, newest first
    History {
        #[arg(long, env = "PMASSIST_TENANT")]
        tenant: TenantId,

        #[arg(long, env = "PMASSIST_USER")]
        user: UserId,

        #[arg(long)]
        project: Option<ProjectId>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Load users, projects and tasks from a JSON fixture
    Seed {
        file: PathBuf,
    },

    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable.
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Init => commands::init::run()?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            tenant,
            user,
            project,
            parent,
            no_history,
            question,
        } => {
            let request = QueryRequest {
                question,
                project_id: project,
                parent_session_id: parent,
                include_history: !no_history,
            };
            commands::ask::run(Principal::new(tenant, user), request).await?
        }
        Commands::History {
            tenant,
            user,
            project,
            limit,
        } => {
            let query = HistoryQuery {
                project_id: project,
                limit,
                ..Default::default()
            };
            commands::history::run(Principal::new(tenant, user), query).await?
        }
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Status => commands::status::run()?,
    }

    Ok(())
}
