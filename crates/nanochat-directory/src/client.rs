//! Directory client with timeout and retransmission.
//!
//! Every exchange sends the request, then waits up to the per-attempt
//! timeout for a matching answer. Datagrams from other hosts, or ones that
//! don't answer the outstanding request, are dropped without resetting the
//! timer. After the last attempt the exchange fails with
//! [`DirectoryError::DirectoryUnreachable`].

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::{UdpSocket, lookup_host};
use tokio::time::Instant;

use crate::{DirectoryError, DirectoryMessage, MAX_TIMEOUTS, PACKET_MAX_SIZE, TIMEOUT};

/// Talks to one directory over a private UDP socket.
pub struct DirectoryClient {
    socket: UdpSocket,
    directory: SocketAddr,
    timeout: Duration,
    max_attempts: u32,
}

impl DirectoryClient {
    /// Resolves `directory` and binds an ephemeral local socket.
    pub async fn connect(directory: &str) -> Result<Self, DirectoryError> {
        let directory = lookup_host(directory)
            .await
            .map_err(|_| DirectoryError::BadAddress(directory.to_string()))?
            .next()
            .ok_or_else(|| DirectoryError::BadAddress(directory.to_string()))?;

        let local = if directory.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await.map_err(|source| {
            DirectoryError::BindFailed {
                addr: local.to_string(),
                source,
            }
        })?;

        Ok(Self {
            socket,
            directory,
            timeout: TIMEOUT,
            max_attempts: MAX_TIMEOUTS,
        })
    }

    /// Overrides the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the number of attempts (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Asks which chat server serves `protocol`.
    ///
    /// `Ok(None)` means the directory answered that nobody does.
    pub async fn server_info(
        &self,
        protocol: i32,
    ) -> Result<Option<SocketAddrV4>, DirectoryError> {
        let request = DirectoryMessage::InfoRequest { protocol };
        self.exchange(&request, |reply| match reply {
            DirectoryMessage::InfoOk { addr } => Some(Some(addr)),
            DirectoryMessage::NotFound => Some(None),
            _ => None,
        })
        .await
    }

    /// Registers this host as the server for `protocol` on `port`.
    pub async fn register(
        &self,
        protocol: i32,
        port: u16,
    ) -> Result<(), DirectoryError> {
        let request = DirectoryMessage::RegistrationRequest { protocol, port };
        self.exchange(&request, |reply| {
            matches!(reply, DirectoryMessage::RegistrationOk).then_some(())
        })
        .await
    }

    async fn exchange<T>(
        &self,
        request: &DirectoryMessage,
        accept: impl Fn(DirectoryMessage) -> Option<T>,
    ) -> Result<T, DirectoryError> {
        let datagram = request.encode();
        let mut buf = [0u8; PACKET_MAX_SIZE];

        for attempt in 1..=self.max_attempts {
            self.socket.send_to(&datagram, self.directory).await?;
            let deadline = Instant::now() + self.timeout;

            loop {
                let received = tokio::time::timeout_at(
                    deadline,
                    self.socket.recv_from(&mut buf),
                )
                .await;
                let (len, from) = match received {
                    Err(_) => break,
                    Ok(result) => result?,
                };

                if !is_directory_reply(self.directory, from) {
                    tracing::warn!(%from, directory = %self.directory, "dropping datagram from unknown host");
                    continue;
                }
                match DirectoryMessage::decode(&buf[..len]).map(&accept) {
                    Ok(Some(answer)) => return Ok(answer),
                    Ok(None) => {
                        tracing::debug!(attempt, "dropping unrelated reply");
                    }
                    Err(e) => {
                        tracing::debug!(attempt, error = %e, "dropping bad reply");
                    }
                }
            }

            tracing::debug!(
                attempt,
                max = self.max_attempts,
                directory = %self.directory,
                "directory timeout"
            );
        }

        Err(DirectoryError::DirectoryUnreachable {
            addr: self.directory,
            attempts: self.max_attempts,
        })
    }
}

/// Returns `true` if a datagram from `from` can be the directory's answer.
///
/// Addresses compare after unmapping IPv4-mapped IPv6. A directory
/// addressed as `0.0.0.0` or `::` answers from whichever local address
/// the stack picks, so only the port has to match then.
fn is_directory_reply(directory: SocketAddr, from: SocketAddr) -> bool {
    if directory.port() != from.port() {
        return false;
    }
    let expected = directory.ip().to_canonical();
    expected.is_unspecified() || expected == from.ip().to_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_directory_reply_source_matching() {
        let directory = addr("127.0.0.1:6868");
        assert!(is_directory_reply(directory, addr("127.0.0.1:6868")));
        assert!(is_directory_reply(directory, addr("[::ffff:127.0.0.1]:6868")));
        assert!(!is_directory_reply(directory, addr("127.0.0.1:6869")));
        assert!(!is_directory_reply(directory, addr("10.0.0.7:6868")));
    }

    #[test]
    fn test_unspecified_directory_accepts_any_local_source() {
        let directory = addr("0.0.0.0:6868");
        assert!(is_directory_reply(directory, addr("127.0.0.1:6868")));
        assert!(is_directory_reply(directory, addr("192.168.1.20:6868")));
        assert!(!is_directory_reply(directory, addr("127.0.0.1:9999")));
    }
}
