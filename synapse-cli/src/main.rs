use anyhow::Result;
use clap::Parser;
use synapse_cli::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    synapse_cli::run(cli).await
}
