//! # RagDesk
//!
//! Role-gated question answering over department documents and datasets.
//!
//! Usage:
//!   ragdesk serve                          # Start the HTTP API (default port 8000)
//!   ragdesk index ./markdown_documents     # Index a document tree
//!   ragdesk ask --role finance "What was revenue in Q1?"
//!   ragdesk config                         # Print the effective config, secrets redacted

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragdesk_agent::ServiceContext;
use ragdesk_core::config::{RagDeskConfig, expand_path};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ragdesk",
    version,
    about = "📚 RagDesk: role-gated document and dataset Q&A"
)]
struct Cli {
    /// Config file (defaults to $RAGDESK_CONFIG or ~/.ragdesk/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Index every document under a directory (default: [index].docs_dir)
    Index { dir: Option<PathBuf> },
    /// Answer one question as a given role
    Ask {
        #[arg(short, long)]
        role: String,
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<RagDeskConfig> {
    let config = match path {
        Some(p) => RagDeskConfig::load_from(p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        None => RagDeskConfig::load().context("loading config")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ragdesk=debug,ragdesk_agent=debug,ragdesk_knowledge=debug,ragdesk_tabular=debug,ragdesk_providers=debug,ragdesk_gateway=debug,tower_http=debug"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_redacted_toml()?);
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let ctx = Arc::new(ServiceContext::build(config)?);
            ragdesk_gateway::start(ctx).await?;
        }
        Command::Index { dir } => {
            let dir = dir.unwrap_or_else(|| expand_path(&config.index.docs_dir));
            let ctx = ServiceContext::build(config)?;
            let report = ctx.indexer.index_directory(&dir).await?;
            println!(
                "✅ {} chunks from {}/{} documents ({} failed). Store now holds {} vectors.",
                report.chunks_added,
                report.documents_indexed,
                report.documents_seen,
                report.failures.len(),
                ctx.store.count()?
            );
            for (path, error) in &report.failures {
                println!("   ❌ {path}: {error}");
            }
        }
        Command::Ask { role, query } => {
            let ctx = ServiceContext::build(config)?;
            let answer = ctx.router.answer(&query.join(" "), &role).await;
            println!("{answer}");
        }
    }

    Ok(())
}
