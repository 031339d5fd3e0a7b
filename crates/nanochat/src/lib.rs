//! # nanoChat
//!
//! Room-based text chat over TCP, with servers found through a small UDP
//! discovery directory.
//!
//! This meta crate ties the layers together: the [`ChatServer`] accepts
//! connections and routes them into the room registry, [`run_client`]
//! drives an interactive [`ClientSession`](nanochat_session::ClientSession),
//! and the config types load each program's settings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanochat::prelude::*;
//!
//! # async fn start() -> Result<(), NanoChatError> {
//! let server = ChatServer::builder()
//!     .bind("0.0.0.0:6969")
//!     .directory("127.0.0.1:6868")
//!     .room("lobby")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod server;

pub use client::{resolve_server, run_client, run_interactive};
pub use config::{
    ClientConfig, DEFAULT_DIRECTORY, DEFAULT_PROTOCOL, DEFAULT_SERVER_BIND, DirectoryConfig,
    ServerConfig,
};
pub use error::NanoChatError;
pub use server::{ChatServer, ChatServerBuilder};

/// Installs the `tracing` subscriber used by the binaries.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

pub mod prelude {
    pub use crate::{ChatServer, ChatServerBuilder, ClientConfig, DirectoryConfig, NanoChatError, ServerConfig};
    pub use nanochat_directory::{DirectoryClient, DirectoryServer};
    pub use nanochat_protocol::{Message, Opcode, RoomDescription};
    pub use nanochat_room::{AdmissionPolicy, RoomRegistry};
    pub use nanochat_session::{ClientSession, Command, Notice, SessionState};
}
