//! civicbot CLI: the operator entry point.
//!
//! Commands:
//! - `ingest`    Chunk, embed, and store documents for a tenant
//! - `search`    Ranked search over a tenant's documents
//! - `documents` List a tenant's documents
//! - `remove`    Remove one document
//! - `clear`     Remove every document of a tenant
//! - `history`   Show or clear a conversation
//! - `prompt`    Prepare a turn and print the assembled prompt
//! - `config`    Manage `~/.civicbot/config.toml`

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "civicbot",
    about = "civicbot: multi-tenant knowledge bases and prompt assembly",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add documents to a tenant's knowledge base
    Ingest {
        tenant: String,

        /// Text files; each is stored under its file name
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Replace the whole knowledge base with these files
        #[arg(long)]
        reindex: bool,
    },

    /// Search a tenant's knowledge base
    Search {
        tenant: String,
        query: String,

        /// Number of results (defaults to rag.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a tenant's documents
    Documents {
        tenant: String,

        /// Print each document's reconstructed text
        #[arg(long)]
        full: bool,
    },

    /// Remove a document from a tenant's knowledge base
    Remove { tenant: String, filename: String },

    /// Remove every document from a tenant's knowledge base
    Clear {
        tenant: String,

        #[arg(long)]
        confirm: bool,
    },

    /// Show or clear a conversation
    History {
        tenant: String,

        #[command(flatten)]
        conversation: commands::ConversationArgs,

        /// Clear the conversation instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Record a user message and print the prompt for the next model call
    Prompt {
        tenant: String,
        message: String,

        #[command(flatten)]
        conversation: commands::ConversationArgs,

        #[command(flatten)]
        inputs: commands::prompt::PromptInputs,

        /// Print the assembly report instead of the messages
        #[arg(long)]
        report: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ingest {
            tenant,
            files,
            reindex,
        } => commands::store::ingest(&tenant, &files, reindex).await?,
        Commands::Search {
            tenant,
            query,
            top_k,
            json,
        } => commands::store::search(&tenant, &query, top_k, json).await?,
        Commands::Documents { tenant, full } => commands::store::documents(&tenant, full).await?,
        Commands::Remove { tenant, filename } => commands::store::remove(&tenant, &filename).await?,
        Commands::Clear { tenant, confirm } => commands::store::clear(&tenant, confirm).await?,
        Commands::History {
            tenant,
            conversation,
            clear,
        } => commands::history::run(&tenant, &conversation, clear).await?,
        Commands::Prompt {
            tenant,
            message,
            conversation,
            inputs,
            report,
        } => commands::prompt::run(&tenant, &message, &conversation, &inputs, report).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
