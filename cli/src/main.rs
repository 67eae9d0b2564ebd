//! Muni Docs command-line client

mod cli;
mod commands;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    muni_core::init_logging();

    let cli = Cli::parse();
    commands::dispatch(cli).await
}
