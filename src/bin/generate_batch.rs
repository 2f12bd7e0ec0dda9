use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use wiki_tweets::batch::run_batch;
use wiki_tweets::config;
use wiki_tweets::documents;
use wiki_tweets::error::BatchError;
use wiki_tweets::export;
use wiki_tweets::generate::{DirectGenerator, PostGenerator, TextService, WithTimeout};
use wiki_tweets::model::{LengthStatus, Progress, POST_CHAR_LIMIT};
use wiki_tweets::prompt::PromptTemplate;
use wiki_tweets::remote::RemoteGenerator;
use wiki_tweets::vertex;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate posts for a set of wiki HTML pages and export them as JSON"
)]
struct Args {
    /// HTML files or directories (searched recursively for *.html)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Prompt template file; must contain {html_content}
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Send documents to a running server instead of calling Vertex AI directly
    #[arg(long)]
    server: Option<Url>,

    /// Give up on a single document after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// JSON export path (default derived from the first input file name)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write all posts as plain text to this path
    #[arg(long)]
    text_output: Option<PathBuf>,
}

fn bounded<G: PostGenerator + 'static>(
    generator: G,
    timeout: Option<Duration>,
) -> Box<dyn PostGenerator> {
    match timeout {
        Some(limit) => Box::new(WithTimeout::new(generator, limit)),
        None => Box::new(generator),
    }
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

    let template = match args.prompt_file.clone().or_else(|| cfg.template_path()) {
        Some(path) => PromptTemplate::from_file(&path)
            .await
            .with_context(|| format!("failed to read prompt template {}", path.display()))?,
        None => PromptTemplate::default(),
    };
    if !template.has_marker() {
        warn!("prompt template has no {{html_content}} marker; documents will not be inserted");
    }

    let documents = documents::load_paths(&args.paths).await?;
    if documents.is_empty() {
        return Err(BatchError::NoInput.into());
    }
    info!(documents = documents.len(), "loaded source documents");

    let timeout = args.timeout_secs.map(Duration::from_secs);
    let generator: Box<dyn PostGenerator> = match &args.server {
        Some(base_url) => {
            let remote = RemoteGenerator::new(base_url.clone())?;
            info!(endpoint = %remote.endpoint(), "using remote generation server");
            bounded(remote, timeout)
        }
        None => {
            let Some(client) = vertex::connect(&cfg) else {
                bail!(
                    "no Google credentials found; set GOOGLE_PROJECT_ID, GOOGLE_CLIENT_EMAIL and \
                     GOOGLE_PRIVATE_KEY, provide {}, or pass --server",
                    cfg.vertex.credential_file
                );
            };
            let service: Arc<dyn TextService> = Arc::new(client);
            bounded(
                DirectGenerator::new(Some(service), cfg.vertex.max_output_tokens),
                timeout,
            )
        }
    };

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let mut observer = |progress: &Progress| {
        pb.set_position((progress.current - 1) as u64);
        pb.set_message(format!(
            "processing {} ({}/{})",
            progress.name, progress.current, progress.total
        ));
    };
    let outcome = run_batch(&documents, &template, generator.as_ref(), &mut observer).await?;
    pb.set_position(documents.len() as u64);
    pb.finish_with_message("done");

    for entry in &outcome.results {
        for (index, post) in entry.posts.iter().enumerate() {
            let status = LengthStatus::of(post);
            if status != LengthStatus::Ok {
                println!(
                    "{} post {}: {} chars ({}, limit {})",
                    entry.document_name,
                    index + 1,
                    post.chars().count(),
                    status.as_str(),
                    POST_CHAR_LIMIT
                );
            }
        }
    }

    if outcome.results.is_empty() {
        bail!(
            "no posts generated: {}",
            outcome.last_error.as_deref().unwrap_or("unknown error")
        );
    }

    let records = export::flatten(&outcome.results);
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(export::export_filename(&documents)));
    tokio::fs::write(&output, serde_json::to_string_pretty(&records)?)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(path = %output.display(), records = records.len(), "wrote JSON export");

    if let Some(path) = &args.text_output {
        tokio::fs::write(path, export::render_text(&outcome.results))
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote text export");
    }

    println!(
        "Generated {} posts from {}/{} documents -> {}",
        outcome.total_posts(),
        outcome.results.len(),
        documents.len(),
        output.display()
    );
    if let Some(err) = &outcome.last_error {
        println!("Last error: {}", err);
    }
    Ok(())
}
