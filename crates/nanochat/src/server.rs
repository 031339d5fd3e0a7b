//! `ChatServer` builder and server loop.
//!
//! This is the entry point for running a nanoChat server. It ties
//! together all the layers: transport → protocol → room registry, and
//! announces itself to the discovery directory.

use std::sync::Arc;

use nanochat_directory::DirectoryClient;
use nanochat_room::{AdmissionPolicy, OpenAdmission, RoomRegistry};
use nanochat_transport::{TcpTransport, Transport};

use crate::NanoChatError;
use crate::config::{DEFAULT_PROTOCOL, ServerConfig};
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: RoomRegistry,
}

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:6969")
///     .directory("127.0.0.1:6868")
///     .room("lobby")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ChatServerBuilder {
    bind_addr: String,
    directory: Option<String>,
    protocol: i32,
    rooms: Vec<String>,
    admission: Arc<dyn AdmissionPolicy>,
}

impl ChatServerBuilder {
    /// Creates a builder that binds locally and registers nowhere.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:6969".to_string(),
            directory: None,
            protocol: DEFAULT_PROTOCOL,
            rooms: Vec::new(),
            admission: Arc::new(OpenAdmission),
        }
    }

    /// Starts from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind.clone(),
            directory: config.directory.clone(),
            protocol: config.protocol,
            rooms: config.rooms.clone(),
            ..Self::new()
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Registers with the directory at `addr` when the server starts.
    pub fn directory(mut self, addr: &str) -> Self {
        self.directory = Some(addr.to_string());
        self
    }

    /// Sets the protocol id to register under.
    pub fn protocol(mut self, protocol: i32) -> Self {
        self.protocol = protocol;
        self
    }

    /// Adds a room that exists from startup.
    pub fn room(mut self, name: &str) -> Self {
        self.rooms.push(name.to_string());
        self
    }

    /// Sets who may enter rooms.
    pub fn admission(mut self, admission: Arc<dyn AdmissionPolicy>) -> Self {
        self.admission = admission;
        self
    }

    /// Binds the listener and creates the initial rooms.
    pub async fn build(self) -> Result<ChatServer, NanoChatError> {
        let transport = TcpTransport::bind(&self.bind_addr).await?;

        let registry = RoomRegistry::with_admission(self.admission);
        for name in &self.rooms {
            registry.create_room(name).await?;
        }

        Ok(ChatServer {
            transport,
            state: Arc::new(ServerState { registry }),
            directory: self.directory,
            protocol: self.protocol,
        })
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound nanoChat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
    directory: Option<String>,
    protocol: i32,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Registers with the directory, then runs the accept loop.
    ///
    /// A failed registration is logged and the server keeps serving.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), NanoChatError> {
        let port = self.local_addr()?.port();
        if let Some(directory) = &self.directory {
            match register(directory, self.protocol, port).await {
                Ok(()) => tracing::info!(%directory, protocol = self.protocol, port, "registered with directory"),
                Err(e) => tracing::warn!(%directory, error = %e, "directory registration failed"),
            }
        }

        tracing::info!(port, "nanoChat server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn register(directory: &str, protocol: i32, port: u16) -> Result<(), NanoChatError> {
    let client = DirectoryClient::connect(directory).await?;
    client.register(protocol, port).await?;
    Ok(())
}
