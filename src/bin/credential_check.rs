use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use wiki_tweets::config;
use wiki_tweets::credentials;
use wiki_tweets::vertex::VertexClient;

/// Show which Google credentials the service would use.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Also exchange the credentials for an access token
    #[arg(long)]
    fetch_token: bool,
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

    let Some(resolved) = credentials::resolve(&cfg.credential_path()) else {
        bail!("no usable Google credentials");
    };
    println!("Source:    {}", resolved.source.as_str());
    println!("Project:   {}", resolved.credentials.project_id());
    println!("Principal: {}", resolved.credentials.principal());

    let client = VertexClient::new(resolved.credentials, &cfg.vertex.location, &cfg.vertex.model)?;
    let target = client.target();
    println!("Model:     {} ({})", target.model, target.location);

    if args.fetch_token {
        let token = client.tokens().bearer().await?;
        println!("Token:     ok ({} chars)", token.len());
    }
    Ok(())
}
