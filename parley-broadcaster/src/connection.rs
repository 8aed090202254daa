//! One WebSocket connection: read requests, write queued frames

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::broadcaster::ChatRoom;
use crate::client::{ClientHandle, Delivery};
use crate::events::{ClientRequest, ServerEvent};
use crate::session::SessionController;

/// Closing handshake budget for a peer that may have stopped reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serve a connection until the peer leaves, errors, or is kicked.
///
/// Reads and writes share one task: a stalled socket only stalls this
/// connection, since the room never awaits on its queue. A kick interrupts
/// even a write that is blocked on the socket.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, room: Arc<ChatRoom>) {
    let config = websocket_config(room.config().hard_frame_limit());
    let ws = match tokio_tungstenite::accept_async_with_config(stream, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer, "WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    let max_frame_bytes = room.config().max_frame_bytes;
    let (client, mut mailbox) = ClientHandle::channel(room.config().outbound_queue);
    let mut session = SessionController::new(room, client.clone());
    let connection = session.connection_id();
    let kick = mailbox.kick_signal();
    tracing::info!(%peer, %connection, "Client connected");

    loop {
        tokio::select! {
            frame = mailbox.recv() => {
                let Some(frame) = frame else { break };
                tokio::select! {
                    written = sink.send(Message::Text(frame.to_string().into())) => {
                        if let Err(e) = written {
                            tracing::debug!(%connection, "Write failed: {}", e);
                            break;
                        }
                    }
                    _ = kick.notified() => {
                        tracing::warn!(%connection, "Client kicked while stalled on write");
                        break;
                    }
                }
            }

            _ = kick.notified() => {
                tracing::warn!(%connection, "Client kicked");
                break;
            }

            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&mut session, &client, text.as_str(), max_frame_bytes);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        reject(&client, "binary frames are not supported");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%connection, "Read failed: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Transport loss is an implicit leave.
    session.disconnect();
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        tracing::debug!(%connection, "Close handshake timed out");
    }
    tracing::info!(%peer, %connection, "Client disconnected");
}

fn handle_frame(
    session: &mut SessionController,
    client: &ClientHandle,
    text: &str,
    max_frame_bytes: usize,
) {
    if text.len() > max_frame_bytes {
        reject(client, "frame too large");
        return;
    }

    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(connection = %session.connection_id(), "Malformed request: {}", e);
            reject(client, &format!("malformed request: {}", e));
            return;
        }
    };

    if let Err(e) = session.dispatch(request) {
        tracing::debug!(connection = %session.connection_id(), "Request rejected: {}", e);
        reject(client, &e.to_string());
    }
}

/// Inbound limits enforced while reading, before a message is buffered whole
fn websocket_config(hard_limit: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(hard_limit);
    config.max_frame_size = Some(hard_limit);
    config
}

fn reject(client: &ClientHandle, message: &str) -> Delivery {
    let event = ServerEvent::Error {
        message: message.to_string(),
    };
    let json = match event.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize error reply: {}", e);
            return Delivery::Closed;
        }
    };

    let delivery = client.send(Arc::from(json));
    match delivery {
        Delivery::Queued => {}
        Delivery::Dropped(drops) => {
            tracing::debug!(drops, "Error reply dropped, client queue full")
        }
        Delivery::Closed => tracing::debug!("Error reply skipped, client gone"),
    }
    delivery
}
