//! Fixed-layout directory datagrams.
//!
//! All integers are big-endian `i32`. The first byte is the opcode:
//!
//! ```text
//! 0x01 RegistrationRequest  [op][protocol:4][port:4]
//! 0x02 RegistrationOk       [op]
//! 0x03 InfoRequest          [op][protocol:4]
//! 0x04 InfoOk               [op][ipv4:4][port:4]
//! 0x05 NotFound             [op]
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::DirectoryError;

const OP_REGISTRATION_REQUEST: u8 = 0x01;
const OP_REGISTRATION_OK: u8 = 0x02;
const OP_INFO_REQUEST: u8 = 0x03;
const OP_INFO_OK: u8 = 0x04;
const OP_NOT_FOUND: u8 = 0x05;

/// A directory request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryMessage {
    /// A chat server announcing the TCP port it serves `protocol` on.
    RegistrationRequest { protocol: i32, port: u16 },
    RegistrationOk,
    /// A client asking who serves `protocol`.
    InfoRequest { protocol: i32 },
    InfoOk { addr: SocketAddrV4 },
    NotFound,
}

impl DirectoryMessage {
    /// Serializes the message into its datagram layout.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::RegistrationRequest { protocol, port } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(OP_REGISTRATION_REQUEST);
                buf.extend_from_slice(&protocol.to_be_bytes());
                buf.extend_from_slice(&i32::from(port).to_be_bytes());
                buf
            }
            Self::RegistrationOk => vec![OP_REGISTRATION_OK],
            Self::InfoRequest { protocol } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(OP_INFO_REQUEST);
                buf.extend_from_slice(&protocol.to_be_bytes());
                buf
            }
            Self::InfoOk { addr } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(OP_INFO_OK);
                buf.extend_from_slice(&addr.ip().octets());
                buf.extend_from_slice(&i32::from(addr.port()).to_be_bytes());
                buf
            }
            Self::NotFound => vec![OP_NOT_FOUND],
        }
    }

    /// Parses a datagram. The length must match the opcode's layout.
    pub fn decode(data: &[u8]) -> Result<Self, DirectoryError> {
        let (&op, body) = data
            .split_first()
            .ok_or_else(|| DirectoryError::Malformed("empty datagram".into()))?;

        match op {
            OP_REGISTRATION_REQUEST => {
                let [protocol, port] = read_i32s::<2>(op, body)?;
                Ok(Self::RegistrationRequest {
                    protocol,
                    port: to_port(port)?,
                })
            }
            OP_REGISTRATION_OK => {
                read_i32s::<0>(op, body)?;
                Ok(Self::RegistrationOk)
            }
            OP_INFO_REQUEST => {
                let [protocol] = read_i32s::<1>(op, body)?;
                Ok(Self::InfoRequest { protocol })
            }
            OP_INFO_OK => {
                let [ip, port] = read_i32s::<2>(op, body)?;
                let ip = Ipv4Addr::from(ip.to_be_bytes());
                Ok(Self::InfoOk {
                    addr: SocketAddrV4::new(ip, to_port(port)?),
                })
            }
            OP_NOT_FOUND => {
                read_i32s::<0>(op, body)?;
                Ok(Self::NotFound)
            }
            other => Err(DirectoryError::Malformed(format!(
                "unknown opcode {other:#04x}"
            ))),
        }
    }
}

/// Reads exactly `N` big-endian 32-bit words.
fn read_i32s<const N: usize>(
    op: u8,
    body: &[u8],
) -> Result<[i32; N], DirectoryError> {
    if body.len() != N * 4 {
        return Err(DirectoryError::Malformed(format!(
            "opcode {op:#04x} expects {} body bytes, got {}",
            N * 4,
            body.len()
        )));
    }
    let mut out = [0i32; N];
    for (slot, chunk) in out.iter_mut().zip(body.chunks_exact(4)) {
        *slot = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(out)
}

fn to_port(raw: i32) -> Result<u16, DirectoryError> {
    u16::try_from(raw)
        .map_err(|_| DirectoryError::Malformed(format!("port {raw} out of range")))
}
