use clap::Parser;

use chainsync::cli::Cli;
use chainsync::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    Cli::parse().execute().await?;
    Ok(())
}
