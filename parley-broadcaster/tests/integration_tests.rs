use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley_broadcaster::{ChatEvent, ChatServer, ClientRequest, RoomConfig, ServerEvent};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(config: RoomConfig) -> (ChatServer, SocketAddr) {
    let server = ChatServer::new("127.0.0.1:0".parse().unwrap(), config).unwrap();
    let addr = server.start().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Ws, request: ClientRequest) {
    ws.send(Message::Text(request.to_json().unwrap().into()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Ws) -> ServerEvent {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn join(ws: &mut Ws, username: &str) {
    send(
        ws,
        ClientRequest::Join {
            username: username.to_string(),
        },
    )
    .await;
}

async fn wait_for_roster(server: &ChatServer, expected: &[&str], within: Duration) {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let roster = server.room().roster();
        if roster == expected {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("roster is {:?}, expected {:?}", roster, expected);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn users(names: &[&str]) -> ServerEvent {
    ServerEvent::UserList {
        users: names.iter().map(|n| n.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_alice_bob_scenario_over_websocket() {
    let (server, addr) = start_server(RoomConfig::default()).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    assert_eq!(recv(&mut alice).await, ServerEvent::ChatHistory { history: vec![] });
    assert_eq!(recv(&mut alice).await, users(&["alice"]));

    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;
    assert_eq!(recv(&mut bob).await, ServerEvent::ChatHistory { history: vec![] });
    assert_eq!(recv(&mut bob).await, users(&["alice", "bob"]));

    match recv(&mut alice).await {
        ServerEvent::ChatMessage(ChatEvent::System { message, .. }) => {
            assert_eq!(message, "bob joined")
        }
        other => panic!("expected join notice, got {:?}", other),
    }
    assert_eq!(recv(&mut alice).await, users(&["alice", "bob"]));

    send(
        &mut alice,
        ClientRequest::ChatMessage {
            message: "hi".to_string(),
        },
    )
    .await;
    match recv(&mut bob).await {
        ServerEvent::ChatMessage(ChatEvent::Text {
            username, message, ..
        }) => {
            assert_eq!(username, "alice");
            assert_eq!(message, "hi");
        }
        other => panic!("expected text event, got {:?}", other),
    }
    assert_eq!(server.room().history().len(), 1);

    bob.close(None).await.unwrap();
    match recv(&mut alice).await {
        ServerEvent::ChatMessage(ChatEvent::System { message, .. }) => {
            assert_eq!(message, "bob left")
        }
        other => panic!("expected leave notice, got {:?}", other),
    }
    assert_eq!(recv(&mut alice).await, users(&["alice"]));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_voice_is_echoed_to_sender_and_replayed_to_late_joiner() {
    let (server, addr) = start_server(RoomConfig::default()).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    recv(&mut alice).await;
    recv(&mut alice).await;

    send(
        &mut alice,
        ClientRequest::VoiceMessage {
            audio: vec![0x1a, 0x45, 0xdf, 0xa3],
        },
    )
    .await;
    match recv(&mut alice).await {
        ServerEvent::VoiceMessage(ChatEvent::Voice {
            username, audio, ..
        }) => {
            assert_eq!(username, "alice");
            assert_eq!(audio, vec![0x1a, 0x45, 0xdf, 0xa3]);
        }
        other => panic!("expected voice echo, got {:?}", other),
    }

    let mut carol = connect(addr).await;
    join(&mut carol, "carol").await;
    match recv(&mut carol).await {
        ServerEvent::ChatHistory { history } => {
            assert_eq!(history.len(), 1);
            assert!(matches!(history[0], ChatEvent::Voice { .. }));
        }
        other => panic!("expected history, got {:?}", other),
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_protocol_errors_do_not_close_connection() {
    let (server, addr) = start_server(RoomConfig::default()).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        ClientRequest::ChatMessage {
            message: "too early".to_string(),
        },
    )
    .await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::Error { .. }));

    ws.send(Message::Text("{not json".to_string().into())).await.unwrap();
    assert!(matches!(recv(&mut ws).await, ServerEvent::Error { .. }));

    join(&mut ws, "dave").await;
    assert!(matches!(
        recv(&mut ws).await,
        ServerEvent::ChatHistory { .. }
    ));
    assert!(server.room().history().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_history_capacity_over_websocket() {
    let config = RoomConfig {
        history_capacity: 2,
        ..Default::default()
    };
    let (server, addr) = start_server(config).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    recv(&mut alice).await;
    recv(&mut alice).await;
    for n in 0..5 {
        send(
            &mut alice,
            ClientRequest::ChatMessage {
                message: format!("m{}", n),
            },
        )
        .await;
    }

    // Frames from one connection are handled in order, so wait for the last.
    for _ in 0..50 {
        if server.room().history().iter().any(|e| {
            matches!(e, ChatEvent::Text { message, .. } if message == "m4")
        }) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;
    match recv(&mut bob).await {
        ServerEvent::ChatHistory { history } => {
            let texts: Vec<String> = history
                .into_iter()
                .filter_map(|e| match e {
                    ChatEvent::Text { message, .. } => Some(message),
                    _ => None,
                })
                .collect();
            assert_eq!(texts, vec!["m3", "m4"]);
        }
        other => panic!("expected history, got {:?}", other),
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_that_stops_reading_is_evicted() {
    let config = RoomConfig {
        history_capacity: 2,
        outbound_queue: 2,
        max_send_drops: 3,
        echo_voice: false,
        ..Default::default()
    };
    let (server, addr) = start_server(config).await;

    // Joins and then never reads again.
    let mut stalled = connect(addr).await;
    join(&mut stalled, "stalled").await;
    wait_for_roster(&server, &["stalled"], Duration::from_secs(2)).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    recv(&mut alice).await;
    recv(&mut alice).await;

    // Enough clips to fill the socket buffers, the queue, and the drop budget.
    let clip = vec![0x55u8; 1024 * 1024];
    for _ in 0..48 {
        send(&mut alice, ClientRequest::VoiceMessage { audio: clip.clone() }).await;
        if server.room().roster() == ["alice"] {
            break;
        }
    }

    wait_for_roster(&server, &["alice"], Duration::from_secs(10)).await;
    drop(stalled);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_oversized_frames() {
    let config = RoomConfig {
        max_frame_bytes: 1024,
        ..Default::default()
    };
    let (server, addr) = start_server(config).await;

    let mut ws = connect(addr).await;
    join(&mut ws, "alice").await;
    recv(&mut ws).await;
    recv(&mut ws).await;

    // Over the soft limit: rejected with a reply, connection stays up.
    send(
        &mut ws,
        ClientRequest::ChatMessage {
            message: "x".repeat(1500),
        },
    )
    .await;
    assert_eq!(
        recv(&mut ws).await,
        ServerEvent::Error {
            message: "frame too large".to_string()
        }
    );
    send(
        &mut ws,
        ClientRequest::ChatMessage {
            message: "still here".to_string(),
        },
    )
    .await;
    for _ in 0..50 {
        if !server.room().history().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.room().history().len(), 1);

    // Over the transport limit: the connection is dropped unread.
    send(
        &mut ws,
        ClientRequest::ChatMessage {
            message: "x".repeat(5000),
        },
    )
    .await;
    let ended = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("connection left open");
    assert!(
        matches!(ended, None | Some(Err(_)) | Some(Ok(Message::Close(_)))),
        "unexpected frame {:?}",
        ended
    );
    wait_for_roster(&server, &[], Duration::from_secs(2)).await;

    server.stop().await.unwrap();
}
