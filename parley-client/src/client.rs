//! WebSocket connection to a Parley server
//!
//! A writer task drains an outbound queue into the socket and a reader task
//! turns server frames into [`ClientEvent`]s. When the reader stops, the
//! caller gets exactly one `ConnectionLost`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use parley_audio::{AudioError, VoiceTransport};
use parley_broadcaster::{ChatEvent, ClientRequest, ServerEvent};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const EVENT_QUEUE: usize = 256;
const OUTBOUND_QUEUE: usize = 64;

/// What the server told us, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Retained history, delivered once after joining
    History(Vec<ChatEvent>),
    /// Current participants in join order
    Roster(Vec<String>),
    /// Text message or system notice
    Chat(ChatEvent),
    Voice(ChatEvent),
    /// The server refused a request
    Rejected(String),
    /// The socket closed; no further events follow
    ConnectionLost,
}

enum Outbound {
    Request(ClientRequest),
    Close,
}

/// Handle to one chat connection. Clones share the connection.
#[derive(Clone)]
pub struct ChatClient {
    outbound: mpsc::Sender<Outbound>,
    connected: Arc<AtomicBool>,
    joined: Arc<Mutex<Option<String>>>,
}

impl ChatClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:5002`)
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<ClientEvent>)> {
        let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| ClientError::ConnectTimeout(url.to_string()))??;
        info!("Connected to {}", url);

        let (mut sink, mut stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                match outbound {
                    Outbound::Request(request) => {
                        let json = match request.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to encode request: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(json.into())).await {
                            debug!("Send failed: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => break,
                }
            }
            let _ = sink.close().await;
        });

        let reader_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                };
                let event = match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => ClientEvent::from(event),
                    Err(e) => {
                        warn!("Ignoring unrecognized frame: {}", e);
                        continue;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            let _ = event_tx.send(ClientEvent::ConnectionLost).await;
        });

        let client = Self {
            outbound: outbound_tx,
            connected,
            joined: Arc::new(Mutex::new(None)),
        };
        Ok((client, event_rx))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Name sent with the last join, if any
    pub fn username(&self) -> Option<String> {
        self.joined.lock().clone()
    }

    /// Join the room. The name is trimmed; blank names never leave the client.
    pub async fn join(&self, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::EmptyUsername);
        }
        {
            let mut joined = self.joined.lock();
            if let Some(current) = joined.as_ref() {
                return Err(ClientError::AlreadyJoined(current.clone()));
            }
            *joined = Some(username.to_string());
        }

        let result = self
            .request(ClientRequest::Join {
                username: username.to_string(),
            })
            .await;
        if result.is_err() {
            *self.joined.lock() = None;
        }
        result
    }

    /// Send a text message. Surrounding whitespace is trimmed.
    pub async fn send_message(&self, message: &str) -> Result<()> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.ensure_joined()?;
        self.request(ClientRequest::ChatMessage {
            message: message.to_string(),
        })
        .await
    }

    pub async fn send_voice(&self, audio: Vec<u8>) -> Result<()> {
        if audio.is_empty() {
            return Err(ClientError::EmptyVoice);
        }
        self.ensure_joined()?;
        self.request(ClientRequest::VoiceMessage { audio }).await
    }

    /// Close the socket; the event stream ends with `ConnectionLost`
    pub async fn close(&self) {
        let _ = self.outbound.send(Outbound::Close).await;
    }

    fn ensure_joined(&self) -> Result<()> {
        if self.joined.lock().is_none() {
            return Err(ClientError::NotJoined);
        }
        Ok(())
    }

    async fn request(&self, request: ClientRequest) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::Disconnected);
        }
        self.outbound
            .send(Outbound::Request(request))
            .await
            .map_err(|_| ClientError::Disconnected)
    }
}

#[async_trait]
impl VoiceTransport for ChatClient {
    async fn send_voice(&self, payload: Vec<u8>) -> parley_audio::Result<()> {
        ChatClient::send_voice(self, payload)
            .await
            .map_err(|e| AudioError::transport(e.to_string()))
    }
}

impl From<ServerEvent> for ClientEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::ChatHistory { history } => Self::History(history),
            ServerEvent::UserList { users } => Self::Roster(users),
            ServerEvent::ChatMessage(event) => Self::Chat(event),
            ServerEvent::VoiceMessage(event) => Self::Voice(event),
            ServerEvent::Error { message } => Self::Rejected(message),
        }
    }
}
