//! JSON configuration for the three nanoChat programs.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes and a missing file means "all defaults". Command-line flags
//! override whatever the file says.
//!
//! ```json
//! { "bind": "0.0.0.0:7000", "rooms": ["lobby", "random"] }
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::NanoChatError;

/// Protocol identifier chat servers register under in the directory.
pub const DEFAULT_PROTOCOL: i32 = 97_597_757;

/// Default chat server listen address.
pub const DEFAULT_SERVER_BIND: &str = "0.0.0.0:6969";

/// Default directory address, as seen by clients and servers.
pub const DEFAULT_DIRECTORY: &str = "127.0.0.1:6868";

/// Chat server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory to register with; `None` skips registration.
    pub directory: Option<String>,
    pub protocol: i32,
    /// Rooms that exist from startup.
    pub rooms: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_SERVER_BIND.to_string(),
            directory: Some(DEFAULT_DIRECTORY.to_string()),
            protocol: DEFAULT_PROTOCOL,
            rooms: Vec::new(),
        }
    }
}

/// Directory server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub bind: String,
    /// Probability in `[0, 1]` of dropping an inbound datagram.
    pub loss: f64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{}", nanochat_directory::DEFAULT_PORT),
            loss: 0.0,
        }
    }
}

/// Chat client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub directory: String,
    pub protocol: i32,
    /// Per-attempt directory timeout.
    pub timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory: DEFAULT_DIRECTORY.to_string(),
            protocol: DEFAULT_PROTOCOL,
            timeout_ms: nanochat_directory::TIMEOUT.as_millis() as u64,
            max_attempts: nanochat_directory::MAX_TIMEOUTS,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NanoChatError> {
        load(path.as_ref())
    }
}

impl DirectoryConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NanoChatError> {
        load(path.as_ref())
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NanoChatError> {
        load(path.as_ref())
    }
}

/// Reads `path` as JSON, falling back to defaults if it does not exist.
fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T, NanoChatError> {
    let config_err = |reason: String| NanoChatError::Config {
        path: path.display().to_string(),
        reason,
    };
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|e| config_err(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(config_err(e.to_string())),
    }
}
