use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use wiki_tweets::config;
use wiki_tweets::generate::{DirectGenerator, TextService};
use wiki_tweets::prompt::PromptTemplate;
use wiki_tweets::server::{self, AppState};
use wiki_tweets::vertex;

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve the wiki-to-posts generation API")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load_or_default(&args.config)?;

    let template = match cfg.template_path() {
        Some(path) => PromptTemplate::from_file(&path)
            .await
            .with_context(|| format!("failed to read prompt template {}", path.display()))?,
        None => PromptTemplate::default(),
    };
    if !template.has_marker() {
        warn!("prompt template has no {{html_content}} marker");
    }

    let service = vertex::connect(&cfg).map(|client| Arc::new(client) as Arc<dyn TextService>);
    if service.is_none() {
        warn!("no Google credentials found; /api/generate will answer 503");
    }
    let generator = DirectGenerator::new(service, cfg.vertex.max_output_tokens);
    info!(enabled = generator.is_enabled(), "generation client initialized");

    let host = args.host.unwrap_or(cfg.server.host);
    let port = args.port.unwrap_or(cfg.server.port);
    server::serve(AppState::new(generator, template), &host, port).await
}
