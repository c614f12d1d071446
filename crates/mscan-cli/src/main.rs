use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "mscan")]
#[command(about = "mscan CLI - submit market scan analyses and manage workflow nodes", long_about = None)]
struct Cli {
    /// Server root URL (defaults to server.host/server.port from the config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Configuration file (defaults to ~/.config/mscan/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a PDF, start an analysis and wait for the report
    Analyze {
        /// Company to analyse
        #[arg(long)]
        company: String,

        /// Annual report or other source document (PDF)
        #[arg(long)]
        file: PathBuf,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fetch the current result of an analysis once
    Result {
        analysis_id: String,
    },
    /// Inspect or toggle workflow nodes
    Nodes {
        #[command(subcommand)]
        action: NodesAction,
    },
}

#[derive(Subcommand)]
enum NodesAction {
    /// List nodes and their enabled state
    List,
    /// Enable a node
    Enable { node_id: String },
    /// Disable a node
    Disable { node_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.config.as_deref(), cli.server)?;

    match cli.command {
        Commands::Analyze {
            company,
            file,
            output,
        } => commands::analyze::run(&ctx, &company, &file, output.as_deref()).await?,
        Commands::Result { analysis_id } => {
            commands::analyze::show_result(&ctx, &analysis_id).await?
        }
        Commands::Nodes { action } => match action {
            NodesAction::List => commands::nodes::list(&ctx).await?,
            NodesAction::Enable { node_id } => {
                commands::nodes::set_enabled(&ctx, &node_id, true).await?
            }
            NodesAction::Disable { node_id } => {
                commands::nodes::set_enabled(&ctx, &node_id, false).await?
            }
        },
    }

    Ok(())
}
