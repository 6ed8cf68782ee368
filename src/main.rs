use anyhow::{Context, Result};
use clap::Parser;
use livefeed::config::Config;
use livefeed::location::with_filter;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "livefeed")]
#[command(about = "Follow a live stream of posts in your terminal")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page URL the feed belongs to (e.g. https://example.com/?filter=rust)
    #[arg(short, long)]
    url: Option<String>,

    /// Set the `filter` query parameter on the page URL
    #[arg(short, long)]
    filter: Option<String>,

    /// Maximum number of posts kept in the feed
    #[arg(long)]
    capacity: Option<usize>,

    /// Print posts to stdout instead of starting the terminal UI
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.stream.page_url = url;
    }
    if let Some(capacity) = cli.capacity {
        config.feed.capacity = capacity;
    }
    config.validate().context("invalid configuration")?;

    let _log_guard = livefeed::logging::init_logging(&config.logging, cli.headless)?;

    // wss:// endpoints need a process-wide TLS crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut page: Url = config.page_url()?;
    if let Some(filter) = cli.filter.as_deref() {
        page = with_filter(&page, Some(filter));
    }

    if cli.headless {
        livefeed::headless::run(&config, page).await
    } else {
        livefeed::ui::run(&config, page).await
    }
}
