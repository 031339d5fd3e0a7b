//! Sending and receiving whole messages over a [`Connection`].

use nanochat_transport::frame::MAX_FRAME_LEN;
use nanochat_transport::{Connection, TransportError};

use crate::{Message, ProtocolError, decode, encode};

/// Encodes `msg` and checks that it fits in a single frame.
pub fn encode_frame(msg: &Message) -> Result<String, ProtocolError> {
    let text = encode(msg)?;
    if text.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(text.len()).into());
    }
    Ok(text)
}

/// Encodes `msg` and sends it as one frame.
pub async fn send_message<C>(
    conn: &C,
    msg: &Message,
) -> Result<(), ProtocolError>
where
    C: Connection<Error = TransportError>,
{
    let text = encode_frame(msg)?;
    tracing::trace!(id = %conn.id(), op = %msg.opcode(), "sending message");
    conn.send(&text).await?;
    Ok(())
}

/// Receives the next frame and decodes it.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly.
pub async fn recv_message<C>(
    conn: &C,
) -> Result<Option<Message>, ProtocolError>
where
    C: Connection<Error = TransportError>,
{
    let Some(text) = conn.recv().await? else {
        return Ok(None);
    };
    let msg = decode(&text)?;
    tracing::trace!(id = %conn.id(), op = %msg.opcode(), "received message");
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use nanochat_transport::ConnectionId;
    use tokio::sync::Mutex;

    use super::*;
    use crate::Opcode;

    /// Frames sent are queued and handed back by `recv`.
    struct Loopback {
        frames: Mutex<VecDeque<String>>,
    }

    impl Loopback {
        fn new() -> Self {
            Self {
                frames: Mutex::new(VecDeque::new()),
            }
        }
    }

    impl Connection for Loopback {
        type Error = TransportError;

        async fn send(&self, frame: &str) -> Result<(), TransportError> {
            self.frames.lock().await.push_back(frame.to_string());
            Ok(())
        }

        async fn recv(&self) -> Result<Option<String>, TransportError> {
            Ok(self.frames.lock().await.pop_front())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(0)
        }
    }

    #[tokio::test]
    async fn test_send_then_recv_message() {
        let conn = Loopback::new();
        let msg = Message::room(Opcode::CreateRoom, "R1");
        send_message(&conn, &msg).await.unwrap();

        assert_eq!(recv_message(&conn).await.unwrap(), Some(msg));
        assert_eq!(recv_message(&conn).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_recv_surfaces_decode_errors() {
        let conn = Loopback::new();
        conn.send("operation:Bogus\n\n").await.unwrap();
        let err = recv_message(&conn).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownOperation(_)));
    }

    #[tokio::test]
    async fn test_send_refuses_unencodable_message() {
        let conn = Loopback::new();
        let msg = Message::room(Opcode::SendText, "a\nb");
        assert!(send_message(&conn, &msg).await.is_err());
        assert!(conn.frames.lock().await.is_empty());
    }

    #[test]
    fn test_encode_frame_checks_the_frame_limit() {
        // Fits as SendText, but the extra sender line pushes ReceiveText over.
        let text = "x".repeat(MAX_FRAME_LEN - 30);
        let sent = Message::room(Opcode::SendText, text.as_str());
        assert!(encode_frame(&sent).unwrap().len() <= MAX_FRAME_LEN);

        let pushed = Message::receive_text("alice", text.as_str());
        let err = encode_frame(&pushed).unwrap_err();
        assert!(err.is_unsendable());
        assert!(matches!(
            err,
            ProtocolError::Transport(TransportError::FrameTooLarge(n)) if n > MAX_FRAME_LEN
        ));
    }

    #[tokio::test]
    async fn test_oversized_message_never_reaches_the_connection() {
        let conn = Loopback::new();
        let msg = Message::room(Opcode::SendText, "y".repeat(70_000).as_str());
        let err = send_message(&conn, &msg).await.unwrap_err();
        assert!(err.is_unsendable());
        assert!(conn.frames.lock().await.is_empty());
        assert!(!ProtocolError::UnknownOperation("x".into()).is_unsendable());
    }
}
