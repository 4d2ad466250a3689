mod api;
mod auth;
mod cli;
mod context;
mod error;
mod output;
mod trigger;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting citrig - Downstream Pipeline Trigger");
    cli.execute().await?;

    Ok(())
}
