//! Chatdesk - operator console entry point.
//!
//! Signs in against the auth service, browses appeals and messages over
//! the backend REST API, and follows live updates on the realtime channel.

mod commands;
mod console;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use chatdesk_infrastructure::ConsoleConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::console::Console;

/// Chatdesk operator console.
#[derive(Parser, Debug)]
#[command(name = "chatdesk", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./chatdesk.toml when present).
    #[arg(long, short, global = true, env = "CHATDESK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session.
    Login {
        /// Login email.
        #[arg(long)]
        email: String,
        /// Password.
        #[arg(long, env = "CHATDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account, then sign in.
    Register {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Login email.
        #[arg(long)]
        email: String,
        /// Password.
        #[arg(long, env = "CHATDESK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Company to create.
        #[arg(long)]
        company: Option<String>,
        /// Contact phone.
        #[arg(long)]
        phone: Option<String>,
    },
    /// End the session here and on the server.
    Logout,
    /// Show the signed-in user and token status.
    Whoami,
    /// List appeals.
    Appeals {
        /// Tenant to list; defaults to the user's company.
        #[arg(long)]
        company: Option<i64>,
        /// Page size.
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Results to skip.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one appeal.
    Appeal {
        /// Appeal id.
        appeal_id: i64,
    },
    /// Show the messages of an appeal.
    Messages {
        /// Appeal id.
        appeal_id: i64,
        /// Page size.
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Results to skip.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Send a text message to an appeal.
    Send {
        /// Appeal id.
        appeal_id: i64,
        /// Message text.
        text: String,
    },
    /// Change the workflow status of an appeal.
    Status {
        /// Appeal id.
        appeal_id: i64,
        /// New status (`new`, `in_progress`, `closed`...).
        status: String,
    },
    /// Follow live events for the user's company until interrupted.
    Watch {
        /// Tenant to follow; defaults to the user's company.
        #[arg(long)]
        company: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ConsoleConfig::load(cli.config.as_deref())?;
    let console = Console::build(config)?;

    match cli.command {
        Commands::Login { email, password } => commands::login(&console, email, password).await,
        Commands::Register {
            name,
            email,
            password,
            company,
            phone,
        } => commands::register(&console, name, email, password, company, phone).await,
        Commands::Logout => commands::logout(&console).await,
        Commands::Whoami => commands::whoami(&console).await,
        Commands::Appeals {
            company,
            limit,
            offset,
        } => commands::appeals(&console, company, limit, offset).await,
        Commands::Appeal { appeal_id } => commands::appeal(&console, appeal_id).await,
        Commands::Messages {
            appeal_id,
            limit,
            offset,
        } => commands::messages(&console, appeal_id, limit, offset).await,
        Commands::Send { appeal_id, text } => commands::send(&console, appeal_id, &text).await,
        Commands::Status { appeal_id, status } => {
            commands::set_status(&console, appeal_id, status).await
        }
        Commands::Watch { company } => commands::watch(&console, company).await,
    }
}
