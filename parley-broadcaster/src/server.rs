use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::broadcaster::ChatRoom;
use crate::config::RoomConfig;
use crate::connection::handle_connection;
use crate::error::{BroadcasterError, Result};

/// WebSocket front end for a [`ChatRoom`]
pub struct ChatServer {
    bind_addr: SocketAddr,
    room: Arc<ChatRoom>,
    local_addr: RwLock<Option<SocketAddr>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    running: Arc<RwLock<bool>>,
}

impl ChatServer {
    /// Create a server with a fresh room
    pub fn new(bind_addr: SocketAddr, config: RoomConfig) -> Result<Self> {
        Ok(Self::with_room(bind_addr, Arc::new(ChatRoom::new(config)?)))
    }

    /// Create a server around an existing room
    pub fn with_room(bind_addr: SocketAddr, room: Arc<ChatRoom>) -> Self {
        Self {
            bind_addr,
            room,
            local_addr: RwLock::new(None),
            accept_task: Mutex::new(None),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Bind and start accepting clients; returns the bound address
    pub async fn start(&self) -> Result<SocketAddr> {
        let is_running = *self.running.read().await;
        if is_running {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.write().await = Some(local_addr);

        tracing::info!("Chat server listening on ws://{}", local_addr);

        *self.running.write().await = true;

        let room = Arc::clone(&self.room);
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let room = Arc::clone(&room);
                        tokio::spawn(handle_connection(stream, peer, room));
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept client: {}", e);
                    }
                }
            }
            tracing::info!("Client acceptance task stopped");
        });

        *self.accept_task.lock().await = Some(task);

        Ok(local_addr)
    }

    /// Stop accepting clients. Open connections finish on their own.
    pub async fn stop(&self) -> Result<()> {
        let is_running = *self.running.read().await;
        if !is_running {
            return Err(BroadcasterError::NotStarted);
        }

        *self.running.write().await = false;

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }
        *self.local_addr.write().await = None;

        tracing::info!("Chat server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Bound address while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    pub fn room(&self) -> &Arc<ChatRoom> {
        &self.room
    }
}
