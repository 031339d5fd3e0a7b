use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use nanochat::{ChatServerBuilder, ServerConfig, init_tracing};
use tracing::info;

/// nanoChat server: rooms, nicknames and chat over TCP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,

    /// Directory to register with.
    #[arg(long)]
    directory: Option<String>,

    /// Room to create at startup. Repeat for more rooms.
    #[arg(long = "room")]
    rooms: Vec<String>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(directory) = cli.directory {
        config.directory = Some(directory);
    }
    config.rooms.extend(cli.rooms);

    let server = ChatServerBuilder::from_config(&config).build().await?;
    info!(addr = %server.local_addr()?, rooms = config.rooms.len(), "chat server listening");
    server.run().await?;
    Ok(())
}
