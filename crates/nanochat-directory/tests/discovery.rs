//! Integration tests for the directory client's retry contract and the
//! directory server, over real UDP sockets on localhost.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use nanochat_directory::{
    DirectoryClient, DirectoryError, DirectoryMessage, DirectoryServer,
    MAX_TIMEOUTS,
};
use tokio::net::UdpSocket;

const PROTOCOL: i32 = 97597757;

/// Counts datagrams already queued on `socket` without blocking.
fn drain(socket: &UdpSocket) -> usize {
    let mut buf = [0u8; 128];
    let mut n = 0;
    while socket.try_recv_from(&mut buf).is_ok() {
        n += 1;
    }
    n
}

async fn client_for(socket: &UdpSocket, timeout_ms: u64) -> DirectoryClient {
    let addr = socket.local_addr().expect("should have local addr");
    DirectoryClient::connect(&addr.to_string())
        .await
        .expect("client should bind")
        .with_timeout(Duration::from_millis(timeout_ms))
}

#[tokio::test]
async fn test_silent_directory_exhausts_exactly_max_attempts() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.expect("should bind");
    let client = client_for(&silent, 20).await;

    let err = client.server_info(PROTOCOL).await.unwrap_err();
    match err {
        DirectoryError::DirectoryUnreachable { attempts, .. } => {
            assert_eq!(attempts, MAX_TIMEOUTS);
        }
        other => panic!("expected DirectoryUnreachable, got {other:?}"),
    }

    // Give loopback a moment, then count what actually arrived.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(drain(&silent), MAX_TIMEOUTS as usize);
}

#[tokio::test]
async fn test_answer_on_third_attempt_is_used() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.expect("should bind");
    let client = client_for(&fake, 100).await;
    let served = SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 3), 6969);

    let responder = tokio::spawn(async move {
        let mut buf = [0u8; 128];
        let mut seen = 0;
        loop {
            let (len, from) = fake.recv_from(&mut buf).await.expect("recv");
            assert_eq!(
                DirectoryMessage::decode(&buf[..len]).expect("decode"),
                DirectoryMessage::InfoRequest { protocol: PROTOCOL }
            );
            seen += 1;
            if seen == 3 {
                let reply = DirectoryMessage::InfoOk { addr: served }.encode();
                fake.send_to(&reply, from).await.expect("send");
                return (seen, fake);
            }
        }
    });

    let found = client.server_info(PROTOCOL).await.expect("should resolve");
    assert_eq!(found, Some(served));

    let (seen, fake) = responder.await.expect("responder should finish");
    assert_eq!(seen, 3);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(drain(&fake), 0, "no request after the answer");
}

#[tokio::test]
async fn test_unrelated_datagrams_are_skipped_within_the_window() {
    let fake = UdpSocket::bind("127.0.0.1:0").await.expect("should bind");
    let client = client_for(&fake, 500).await;

    let responder = tokio::spawn(async move {
        let mut buf = [0u8; 128];
        let (_, from) = fake.recv_from(&mut buf).await.expect("recv");
        // Wrong type for an info request, then garbage, then the answer.
        fake.send_to(&DirectoryMessage::RegistrationOk.encode(), from)
            .await
            .expect("send");
        fake.send_to(&[0xee, 0xee], from).await.expect("send");
        fake.send_to(&DirectoryMessage::NotFound.encode(), from)
            .await
            .expect("send");
        fake
    });

    let found = client.server_info(PROTOCOL).await.expect("should resolve");
    assert_eq!(found, None);

    let fake = responder.await.expect("responder should finish");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(drain(&fake), 0, "answered on the first attempt");
}

#[tokio::test]
async fn test_register_then_lookup_against_real_server() {
    let server = DirectoryServer::bind("127.0.0.1:0", 0.0)
        .await
        .expect("should bind");
    let addr = server.local_addr().expect("should have local addr");
    tokio::spawn(server.run());

    let client = DirectoryClient::connect(&addr.to_string())
        .await
        .expect("client should bind")
        .with_timeout(Duration::from_millis(200));

    assert_eq!(client.server_info(PROTOCOL).await.expect("lookup"), None);

    client.register(PROTOCOL, 7000).await.expect("register");
    assert_eq!(
        client.server_info(PROTOCOL).await.expect("lookup"),
        Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7000))
    );
    assert_eq!(client.server_info(PROTOCOL + 1).await.expect("lookup"), None);
}

#[tokio::test]
async fn test_lossy_server_makes_client_give_up() {
    let server = DirectoryServer::bind("127.0.0.1:0", 1.0)
        .await
        .expect("should bind");
    let addr = server.local_addr().expect("should have local addr");
    tokio::spawn(server.run());

    let client = DirectoryClient::connect(&addr.to_string())
        .await
        .expect("client should bind")
        .with_timeout(Duration::from_millis(20))
        .with_max_attempts(3);

    let err = client.register(PROTOCOL, 7000).await.unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::DirectoryUnreachable { attempts: 3, .. }
    ));
}
