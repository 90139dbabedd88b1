mod html;
mod http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use linkharvest::{
    ensure_scheme, key_for, CheckpointStore, CrawlState, Crawler, CrawlerOptions, OutputSink,
};
use tokio::signal;
use tracing_subscriber::{prelude::*, EnvFilter};
use url::Url;

use html::HtmlLinkExtractor;
use http::HttpFetcher;

/// Discover every same-domain link of a website, resumably.
///
/// The crawl checkpoints after each page; re-running the same domain picks up
/// where the previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "linkharvest", version)]
struct Cli {
    /// Seed URL or bare host to crawl
    #[arg(short, long)]
    domain: String,

    /// File the discovered URLs are appended to (default: <host>.links.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of concurrent fetch workers
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Directory holding per-domain crawl checkpoints
    #[arg(long, default_value = ".linkharvest")]
    state_dir: PathBuf,

    /// Pause between requests per worker, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Also print each discovered URL to stdout
    #[arg(long)]
    echo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .expect("telemetry: Creating EnvFilter"),
        )
        .init();

    let cli = Cli::parse();

    let seed = ensure_scheme(&cli.domain, "https");
    let seed_url =
        Url::parse(&seed).with_context(|| format!("invalid seed URL '{}'", cli.domain))?;
    let key = key_for(&seed_url)
        .with_context(|| format!("seed URL '{}' has no host", cli.domain))?;
    let output_path = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{key}.links.txt")));

    let store = CheckpointStore::new(&cli.state_dir).with_context(|| {
        format!(
            "cannot create state directory '{}'",
            cli.state_dir.display()
        )
    })?;
    let mut output = OutputSink::append(&output_path)
        .with_context(|| format!("cannot open output file '{}'", output_path.display()))?
        .with_echo(cli.echo);
    let fetcher = Arc::new(
        HttpFetcher::new(Duration::from_secs(cli.timeout_secs))
            .context("building the HTTP client")?,
    );
    let extractor = Arc::new(HtmlLinkExtractor::new());

    let crawler = Crawler::new(
        store,
        CrawlerOptions {
            delay: Duration::from_millis(cli.delay_ms),
            concurrency: cli.concurrency,
        },
    );
    let summary = crawler
        .run(seed_url.as_str(), fetcher, extractor, &mut output, async {
            if let Err(error) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for event: {:?}", error);
            }
        })
        .await?;

    match summary.state {
        CrawlState::Done => println!(
            "done: {} links discovered -> {}",
            summary.discovered,
            output_path.display()
        ),
        CrawlState::Cancelled => println!(
            "interrupted: {} links discovered so far, resume with the same --domain",
            summary.discovered
        ),
    }
    Ok(())
}
