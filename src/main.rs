mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use keepsake::config::KeepsakeConfig;
use keepsake::server;

#[derive(Parser)]
#[command(name = "keepsake", version, about = "Personal fact memory MCP server for conversational agents")]
struct Cli {
    /// Config file (default: ~/.keepsake/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server on the configured transport
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Show fact counts and retrieval mode
    Stats {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the context block recalled for a message
    Context {
        query: String,
    },
    /// Learn facts from one message, as the server would
    Learn {
        utterance: String,
    },
    /// Store a fact directly
    Remember {
        text: String,
        /// identity, interests, preferences, relationships, events, goals, routines or other
        #[arg(long, default_value = "other")]
        category: String,
    },
    /// Write every fact to a training export file
    Export {
        /// Output path (default: storage.export_path)
        path: Option<PathBuf>,
    },
    /// Load facts from a training export file
    Import {
        file: PathBuf,
    },
    /// Rebuild the semantic index from the fact file
    Reindex,
    /// Check storage, model and endpoint health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.keepsake/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KeepsakeConfig::load_from(path)?,
        None => KeepsakeConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Stats { json } => cli::stats::stats(config, json).await?,
        Command::Context { query } => cli::context::context(config, &query).await?,
        Command::Learn { utterance } => cli::learn::learn(config, &utterance).await?,
        Command::Remember { text, category } => {
            cli::remember::remember(config, &text, &category).await?
        }
        Command::Export { path } => cli::export::export(&config, path)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Reindex => cli::reindex::reindex(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config).await?,
    }

    Ok(())
}
