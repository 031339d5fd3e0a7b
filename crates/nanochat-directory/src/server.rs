//! The directory server: a protocol → chat server address table on UDP.
//!
//! Datagrams are handled one at a time, in arrival order. A registration
//! records the sender's IP together with the port it declares, replacing
//! any earlier entry for the same protocol. Entries never expire.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;

use crate::{DirectoryError, DirectoryMessage, PACKET_MAX_SIZE};

/// A running directory bound to a UDP socket.
pub struct DirectoryServer {
    socket: UdpSocket,
    table: HashMap<i32, SocketAddrV4>,
    /// Probability in `[0, 1]` of discarding an inbound datagram.
    loss: f64,
}

impl DirectoryServer {
    /// Binds the directory socket.
    ///
    /// `loss` is clamped to `[0, 1]`; anything above zero makes the server
    /// ignore that share of requests, which exercises client retries.
    pub async fn bind(addr: &str, loss: f64) -> Result<Self, DirectoryError> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| {
            DirectoryError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        let loss = if loss.is_nan() { 0.0 } else { loss.clamp(0.0, 1.0) };
        tracing::info!(addr, loss, "directory listening");
        Ok(Self {
            socket,
            table: HashMap::new(),
            loss,
        })
    }

    /// Returns the local address the socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Returns the address registered for `protocol`, if any.
    pub fn lookup(&self, protocol: i32) -> Option<SocketAddrV4> {
        self.table.get(&protocol).copied()
    }

    /// Serves requests until the socket fails.
    pub async fn run(mut self) -> Result<(), DirectoryError> {
        let mut buf = [0u8; PACKET_MAX_SIZE];
        loop {
            let (len, src) = self.socket.recv_from(&mut buf).await?;

            if self.loss > 0.0 && rand::random::<f64>() < self.loss {
                tracing::warn!(%src, "discarding datagram");
                continue;
            }

            let Some(reply) = self.handle_datagram(src, &buf[..len]) else {
                continue;
            };
            if let Err(e) = self.socket.send_to(&reply.encode(), src).await {
                tracing::debug!(%src, error = %e, "failed to send reply");
            }
        }
    }

    /// Applies one datagram to the table and returns the reply, if any.
    pub fn handle_datagram(
        &mut self,
        src: SocketAddr,
        data: &[u8],
    ) -> Option<DirectoryMessage> {
        let msg = match DirectoryMessage::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%src, error = %e, "ignoring datagram");
                return None;
            }
        };

        match msg {
            DirectoryMessage::RegistrationRequest { protocol, port } => {
                let Some(ip) = source_ipv4(src) else {
                    tracing::warn!(%src, "registration from non-IPv4 source");
                    return None;
                };
                let addr = SocketAddrV4::new(ip, port);
                if let Some(previous) = self.table.insert(protocol, addr) {
                    tracing::info!(protocol, %addr, %previous, "server replaced");
                } else {
                    tracing::info!(protocol, %addr, "server registered");
                }
                Some(DirectoryMessage::RegistrationOk)
            }
            DirectoryMessage::InfoRequest { protocol } => {
                match self.lookup(protocol) {
                    Some(addr) => {
                        tracing::debug!(%src, protocol, %addr, "info request");
                        Some(DirectoryMessage::InfoOk { addr })
                    }
                    None => {
                        tracing::debug!(%src, protocol, "info request: not found");
                        Some(DirectoryMessage::NotFound)
                    }
                }
            }
            other => {
                tracing::debug!(%src, ?other, "ignoring response-type datagram");
                None
            }
        }
    }
}

fn source_ipv4(src: SocketAddr) -> Option<std::net::Ipv4Addr> {
    match src.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn src(a: u8, port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::new(10, 0, 0, a), port))
    }

    #[tokio::test]
    async fn test_info_for_unknown_protocol_is_not_found() {
        let mut server = DirectoryServer::bind("127.0.0.1:0", 0.0).await.unwrap();
        let req = DirectoryMessage::InfoRequest { protocol: 1 }.encode();
        assert_eq!(
            server.handle_datagram(src(1, 5000), &req),
            Some(DirectoryMessage::NotFound)
        );
    }

    #[tokio::test]
    async fn test_registration_uses_source_ip_and_declared_port() {
        let mut server = DirectoryServer::bind("127.0.0.1:0", 0.0).await.unwrap();
        let reg = DirectoryMessage::RegistrationRequest {
            protocol: 7,
            port: 6969,
        };
        assert_eq!(
            server.handle_datagram(src(2, 40000), &reg.encode()),
            Some(DirectoryMessage::RegistrationOk)
        );

        let expected = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 6969);
        let req = DirectoryMessage::InfoRequest { protocol: 7 }.encode();
        assert_eq!(
            server.handle_datagram(src(9, 1), &req),
            Some(DirectoryMessage::InfoOk { addr: expected })
        );
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut server = DirectoryServer::bind("127.0.0.1:0", 0.0).await.unwrap();
        for (host, port) in [(2, 1000), (3, 2000)] {
            let reg = DirectoryMessage::RegistrationRequest { protocol: 7, port };
            server.handle_datagram(src(host, 1), &reg.encode());
        }
        assert_eq!(
            server.lookup(7),
            Some(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 3), 2000))
        );
    }

    #[tokio::test]
    async fn test_garbage_and_responses_get_no_reply() {
        let mut server = DirectoryServer::bind("127.0.0.1:0", 0.0).await.unwrap();
        assert_eq!(server.handle_datagram(src(1, 1), &[0xff, 1, 2]), None);
        assert_eq!(
            server.handle_datagram(src(1, 1), &DirectoryMessage::NotFound.encode()),
            None
        );
    }

    #[tokio::test]
    async fn test_loss_is_clamped() {
        let server = DirectoryServer::bind("127.0.0.1:0", 7.5).await.unwrap();
        assert_eq!(server.loss, 1.0);
        let server = DirectoryServer::bind("127.0.0.1:0", -1.0).await.unwrap();
        assert_eq!(server.loss, 0.0);
    }
}
