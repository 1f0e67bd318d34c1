//! contribmerge CLI: keep a curated contributions page in sync with merged
//! pull requests.
//!
//! Fetches recent merged pull requests, describes each repository, and
//! merges new entries into the category sections of a markdown document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
