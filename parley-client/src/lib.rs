//! Parley Chat Client
//!
//! Connects to a Parley server over WebSocket, validates input locally and
//! streams room events back to the caller.
//!
//! ## Example
//!
//! ```no_run
//! use parley_client::{ChatClient, ClientEvent};
//!
//! #[tokio::main]
//! async fn main() -> parley_client::Result<()> {
//!     let (client, mut events) = ChatClient::connect("ws://127.0.0.1:5002").await?;
//!     client.join("alice").await?;
//!     client.send_message("hello").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if event == ClientEvent::ConnectionLost {
//!             break;
//!         }
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod playback;

pub use client::{ChatClient, ClientEvent};
pub use error::{ClientError, Result};
pub use playback::{clip_file_name, save_clip};
