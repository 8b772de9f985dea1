use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kbrag_answer::{ChatPayload, RagService};
use kbrag_cli::{logging, server};
use kbrag_core::config::{resolve_with_base, Config};
use kbrag_embed::get_default_embedder;
use kbrag_vector::IndexBuilder;

#[derive(Parser)]
#[command(name = "kbrag", about = "Question answering over an internal document corpus", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector index from the corpus, replacing any existing index
    Index {
        #[arg(long)]
        data_dir: Option<String>,
        #[arg(long)]
        index_dir: Option<String>,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Answer one question and print the JSON response
    Ask {
        query: String,
        #[arg(long)]
        k: Option<i64>,
        #[arg(long, default_value = "chain")]
        mode: String,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();
    let cli = Cli::parse();

    let settings = Config::load()?.settings().context("loading configuration")?;
    let base_dir = std::env::current_dir()?;

    match cli.command {
        Command::Index { data_dir, index_dir, quiet } => {
            let data_dir = data_dir
                .map(|d| resolve_with_base(&base_dir, d))
                .unwrap_or_else(|| settings.data.raw_dir_path(&base_dir));
            let index_dir: PathBuf = index_dir
                .map(|d| resolve_with_base(&base_dir, d))
                .unwrap_or_else(|| settings.data.index_dir_path(&base_dir));

            let embedder = get_default_embedder(&settings.embedding)?;
            let builder = IndexBuilder::from_settings(&settings, embedder)?.with_progress(!quiet);
            let report = builder.build(&data_dir, &index_dir).await?;

            println!("Indexed {} documents into {} chunks", report.documents, report.chunks);
            println!("Index: {} ({}-dim, {})", index_dir.display(), report.dimension, report.embedder_id);
            if report.skipped > 0 {
                println!("Skipped {} unsupported files", report.skipped);
            }
            if !report.failures.is_empty() {
                println!("Failed to read {} files:", report.failures.len());
                for failure in &report.failures {
                    println!("  {}: {}", failure.path.display(), failure.message);
                }
            }
        }
        Command::Ask { query, k, mode } => {
            let service = RagService::from_settings(&settings, &base_dir)?;
            let response = service.chat(ChatPayload { query: Some(query), k, mode: Some(mode) }).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;
            let service = Arc::new(RagService::from_settings(&settings, &base_dir)?);
            server::serve(service, addr, Duration::from_secs(settings.server.request_timeout_secs)).await?;
        }
    }
    Ok(())
}
