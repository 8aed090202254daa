//! Room engine and WebSocket server for Parley chat
//!
//! This crate accepts WebSocket clients, tracks who has joined the shared
//! room, keeps a bounded history for late joiners, and fans text, voice and
//! system events out to every participant.
//!
//! # Features
//!
//! - One JSON text frame per event: `{"event": ..., "data": ...}`
//! - Bounded, FIFO-evicting history (RAM only)
//! - Join-ordered roster, duplicate names allowed
//! - Non-blocking per-client fan-out with slow-client eviction
//! - Per-kind echo policy (text not echoed, voice echoed by default)
//!
//! # Event Types
//!
//! Client to server:
//! - `join` - `{ username }`
//! - `chat_message` - `{ message }`
//! - `voice_message` - `{ audio_data }` (base64)
//!
//! Server to client:
//! - `chat_history` - retained events, once after join
//! - `user_list` - roster, on every join/leave
//! - `chat_message` - text or system event
//! - `voice_message` - voice event
//! - `error` - rejected request
//!
//! # Example Usage
//!
//! ```no_run
//! use parley_broadcaster::{ChatServer, RoomConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::new("0.0.0.0:5002".parse()?, RoomConfig::default())?;
//!     let addr = server.start().await?;
//!     println!("listening on ws://{}", addr);
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod history;
pub mod registry;
pub mod server;
pub mod session;

// Re-exports
pub use broadcaster::ChatRoom;
pub use client::{ClientHandle, ClientMailbox, Delivery};
pub use config::RoomConfig;
pub use error::{BroadcasterError, Result, SessionError};
pub use events::{ChatEvent, ClientRequest, EventDraft, ServerEvent};
pub use history::HistoryBuffer;
pub use registry::{ConnectionId, ConnectionRegistry, SessionHandle};
pub use server::ChatServer;
pub use session::{SessionController, SessionState};
