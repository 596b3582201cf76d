use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use github_client::GithubClient;
use orbit_core::{present, TrackerStore};

use crate::app::App;
use crate::console::ConsoleSink;

mod app;
mod console;

#[derive(Parser, Debug)]
#[command(name = "orbit")]
#[command(about = "Track GitHub followers and following over time")]
struct Cli {
    /// Path of the local tracker data file
    #[arg(long, default_value = "github-tracker.json")]
    data_file: std::path::PathBuf,

    /// Track this login instead of the one remembered from last session
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("orbit=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let authenticated = std::env::var("GITHUB_TOKEN").is_ok();
    info!(data_file = %cli.data_file.display(), authenticated, "Orbit starting...");

    // GITHUB_TOKEN raises the API quota; anonymous works for small accounts.
    let client = GithubClient::from_env();
    let (store, report) = TrackerStore::open(&cli.data_file, Arc::new(client));

    let mut sink = ConsoleSink::stdout();
    present::report_load(&mut sink, &report);

    App::new(store, sink, cli.user).run().await
}
