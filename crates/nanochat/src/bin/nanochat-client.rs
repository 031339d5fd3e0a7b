use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nanochat::{ClientConfig, init_tracing, run_client};

/// nanoChat interactive client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to look the chat server up in.
    #[arg(long)]
    directory: Option<String>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(directory) = cli.directory {
        config.directory = directory;
    }

    run_client(&config)
        .await
        .with_context(|| format!("chat client failed (directory {})", config.directory))?;
    Ok(())
}
