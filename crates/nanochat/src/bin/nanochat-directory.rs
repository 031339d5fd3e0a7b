use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use nanochat::{DirectoryConfig, init_tracing};
use nanochat_directory::DirectoryServer;
use tracing::info;

/// UDP directory that tells clients where chat servers are.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,

    /// Probability of dropping an inbound datagram, for exercising retries.
    #[arg(long)]
    loss: Option<f64>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DirectoryConfig::from_file(path)?,
        None => DirectoryConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(loss) = cli.loss {
        config.loss = loss;
    }

    let server = DirectoryServer::bind(&config.bind, config.loss).await?;
    info!(addr = %server.local_addr()?, loss = config.loss, "directory listening");
    server.run().await?;
    Ok(())
}
