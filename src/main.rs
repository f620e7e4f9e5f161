mod cli;
mod config;
mod error;
mod gitlab;
mod output;
mod report;
mod tokens;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting glfetch - GitLab project and pipeline fetcher");
    cli.execute().await?;

    Ok(())
}
