//! Drives a `ClientSession` against a scripted server on a real socket.

use std::time::Duration;

use nanochat_protocol::{Message, Opcode, RoomDescription, recv_message, send_message};
use nanochat_session::{ClientSession, Command, Notice, SessionError, SessionState};
use nanochat_transport::{Connection, TcpConnection, TcpTransport, Transport};

async fn connected() -> (ClientSession, TcpConnection) {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");
    let accept = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let session = ClientSession::connect(addr).await.expect("should connect");
    let server = accept.await.expect("task should complete");
    (session, server)
}

/// Expects `request` from the client, then answers with `replies`.
async fn serve(server: &TcpConnection, request: Message, replies: &[Message]) {
    let got = recv_message(server).await.expect("recv").expect("open");
    assert_eq!(got, request);
    for reply in replies {
        send_message(server, reply).await.expect("send");
    }
}

async fn command(
    session: &mut ClientSession,
    server: &TcpConnection,
    line: &str,
    request: Message,
    replies: &[Message],
) -> Vec<Notice> {
    let cmd = Command::parse(line).unwrap().unwrap();
    let (result, ()) = tokio::join!(session.execute(cmd), serve(server, request, replies));
    result.expect("command should succeed")
}

async fn registered_in_room(room: &str) -> (ClientSession, TcpConnection) {
    let (mut session, server) = connected().await;
    command(
        &mut session,
        &server,
        "nick alice",
        Message::room(Opcode::RegisterNick, "alice"),
        &[Message::control(Opcode::ValidNick)],
    )
    .await;
    command(
        &mut session,
        &server,
        &format!("enter {room}"),
        Message::room(Opcode::RoomEnter, room),
        &[Message::control(Opcode::RoomEnterOk)],
    )
    .await;
    assert_eq!(session.state(), SessionState::InRoom);
    (session, server)
}

#[tokio::test]
async fn test_register_duplicate_then_valid() {
    let (mut session, server) = connected().await;
    assert_eq!(session.state(), SessionState::PreRegister);

    let notices = command(
        &mut session,
        &server,
        "nick alice",
        Message::room(Opcode::RegisterNick, "alice"),
        &[Message::control(Opcode::DuplicatedNick)],
    )
    .await;
    assert_eq!(notices, [Notice::NickDuplicated("alice".into())]);
    assert_eq!(session.state(), SessionState::PreRegister);

    let notices = command(
        &mut session,
        &server,
        "nick alice2",
        Message::room(Opcode::RegisterNick, "alice2"),
        &[Message::control(Opcode::ValidNick)],
    )
    .await;
    assert_eq!(notices, [Notice::NickAccepted("alice2".into())]);
    assert_eq!(session.state(), SessionState::OffRoom);
    assert_eq!(session.nick(), Some("alice2"));
}

#[tokio::test]
async fn test_wrong_state_command_sends_nothing() {
    let (mut session, server) = connected().await;

    let err = session.execute(Command::RoomList).await.unwrap_err();
    assert!(matches!(err, SessionError::NotAllowed { .. }));
    assert_eq!(session.state(), SessionState::PreRegister);

    let nothing = tokio::time::timeout(Duration::from_millis(50), recv_message(&server)).await;
    assert!(nothing.is_err(), "no frame should have been sent");
}

#[tokio::test]
async fn test_room_list_reply() {
    let (mut session, server) = connected().await;
    command(
        &mut session,
        &server,
        "nick bob",
        Message::room(Opcode::RegisterNick, "bob"),
        &[Message::control(Opcode::ValidNick)],
    )
    .await;

    let rooms = vec![RoomDescription {
        name: "R1".into(),
        members: vec!["alice".into()],
        last_message: 0,
    }];
    let notices = command(
        &mut session,
        &server,
        "roomlist",
        Message::control(Opcode::RoomList),
        &[Message::room_list_ok(rooms.clone())],
    )
    .await;
    match notices.as_slice() {
        [Notice::RoomList { rooms: got, .. }] => assert_eq!(*got, rooms),
        other => panic!("unexpected notices: {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_arriving_during_request_becomes_notice() {
    let (mut session, server) = registered_in_room("R1").await;

    let info = RoomDescription {
        name: "R1".into(),
        members: vec!["alice".into(), "bob".into()],
        last_message: 0,
    };
    let notices = command(
        &mut session,
        &server,
        "info",
        Message::room(Opcode::RoomInfo, "R1"),
        &[
            Message::receive_text("bob", "hi"),
            Message::room(Opcode::UserIn, "carol"),
            Message::room_info_ok(info.clone()),
        ],
    )
    .await;

    assert_eq!(notices.len(), 3);
    assert_eq!(
        notices[0],
        Notice::Chat {
            from: "bob".into(),
            text: "hi".into()
        }
    );
    assert_eq!(
        notices[1],
        Notice::UserJoined {
            nick: "carol".into(),
            room: "R1".into()
        }
    );
    assert!(matches!(&notices[2], Notice::RoomInfo { room, .. } if *room == info));
}

#[tokio::test]
async fn test_rename_waits_for_its_own_name() {
    let (mut session, server) = registered_in_room("R1").await;

    let notices = command(
        &mut session,
        &server,
        "rename R3",
        Message::room(Opcode::RenameRoom, "R3"),
        &[
            Message::room(Opcode::RenameRoomOk, "R2"),
            Message::room(Opcode::RenameRoomOk, "R3"),
        ],
    )
    .await;

    assert_eq!(
        notices,
        [
            Notice::RoomRenamed("R2".into()),
            Notice::Renamed {
                from: "R2".into(),
                to: "R3".into()
            },
        ]
    );
    assert_eq!(session.room(), Some("R3"));
}

#[tokio::test]
async fn test_rename_refused_stays_in_room() {
    let (mut session, server) = registered_in_room("R1").await;
    let notices = command(
        &mut session,
        &server,
        "rename taken",
        Message::room(Opcode::RenameRoom, "taken"),
        &[Message::control(Opcode::InvalidRoom)],
    )
    .await;
    assert_eq!(notices, [Notice::RenameRefused("taken".into())]);
    assert_eq!(session.state(), SessionState::InRoom);
    assert_eq!(session.room(), Some("R1"));
}

#[tokio::test]
async fn test_send_joins_words_and_exit_leaves() {
    let (mut session, server) = registered_in_room("R1").await;

    let notices = command(
        &mut session,
        &server,
        "send hello   there",
        Message::room(Opcode::SendText, "hello there"),
        &[],
    )
    .await;
    assert!(notices.is_empty());

    let notices = command(
        &mut session,
        &server,
        "exit",
        Message::control(Opcode::ExitRoom),
        &[],
    )
    .await;
    assert_eq!(notices, [Notice::Left("R1".into())]);
    assert_eq!(session.state(), SessionState::OffRoom);
    assert_eq!(session.room(), None);
}

#[tokio::test]
async fn test_next_inbound_then_server_close() {
    let (mut session, server) = registered_in_room("R1").await;

    send_message(&server, &Message::receive_text("bob", "yo"))
        .await
        .expect("send");
    assert_eq!(
        session.next_inbound().await,
        Notice::Chat {
            from: "bob".into(),
            text: "yo".into()
        }
    );

    server.close().await.expect("close");
    drop(server);
    assert!(matches!(
        session.next_inbound().await,
        Notice::ConnectionLost(_)
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.execute(Command::RoomList).await,
        Err(SessionError::NotAllowed { .. })
    ));
}

#[tokio::test]
async fn test_quit_from_room() {
    let (mut session, server) = registered_in_room("R1").await;
    let notices = session.execute(Command::Quit).await.expect("quit");
    assert_eq!(notices, [Notice::Bye]);
    assert_eq!(session.state(), SessionState::Quit);

    // The server sees the connection end.
    let eof = recv_message(&server).await.expect("clean close");
    assert!(eof.is_none());
}

#[tokio::test]
async fn test_oversized_send_is_refused_locally_and_stays_in_room() {
    let (mut session, server) = registered_in_room("R1").await;

    // Too big for one frame even as SendText.
    let err = session
        .execute(Command::Send("y".repeat(70_000)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Unsendable(_)), "got {err:?}");
    assert!(!err.is_communication());

    // Fits as SendText, but not once the server attaches our nickname.
    let err = session
        .execute(Command::Send("y".repeat(u16::MAX as usize - 30)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Unsendable(_)), "got {err:?}");

    assert_eq!(session.state(), SessionState::InRoom);
    assert_eq!(session.room(), Some("R1"));
    let nothing = tokio::time::timeout(Duration::from_millis(50), recv_message(&server)).await;
    assert!(nothing.is_err(), "no frame should have been sent");

    // The session and the server still agree: a chat line goes through.
    let notices = command(
        &mut session,
        &server,
        "send still here",
        Message::room(Opcode::SendText, "still here"),
        &[],
    )
    .await;
    assert!(notices.is_empty());
    assert_eq!(session.state(), SessionState::InRoom);
}
