//! parcel CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use parcel_cli::cmd;
use parcel_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = cli.catalog.as_deref();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Info { package, json } => cmd::info::info(catalog, &package, json).await,
        Commands::Search { query } => cmd::search::search(catalog, &query).await,
        Commands::Suggest { query } => cmd::search::suggest(catalog, &query).await,
        Commands::Featured => cmd::search::featured(catalog).await,
        Commands::Download { package } => cmd::lifecycle::download(catalog, &package, quiet).await,
        Commands::Install { package } => cmd::lifecycle::install(catalog, &package, quiet).await,
        Commands::Launch { package } => cmd::lifecycle::launch(catalog, &package).await,
        Commands::Classify { file } => cmd::classify::classify(&file).await,
        Commands::Urn { text } => cmd::urn::urn(&text),
    }
}
