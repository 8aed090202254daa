use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

/// Result of queueing one frame for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; frame dropped. Carries the lifetime drop count.
    Dropped(u64),
    /// Receiving side is gone
    Closed,
}

/// Sending half of a client connection.
///
/// Cloned into the registry so the room can fan out without ever awaiting
/// on a recipient: a full queue drops the frame for that recipient only.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    tx: mpsc::Sender<Arc<str>>,
    kick: Arc<Notify>,
    drops: Arc<AtomicU64>,
}

/// Receiving half, owned by the connection task that writes to the socket
pub struct ClientMailbox {
    rx: mpsc::Receiver<Arc<str>>,
    kick: Arc<Notify>,
}

impl ClientHandle {
    /// Create a connected handle/mailbox pair with a bounded queue
    pub fn channel(capacity: usize) -> (ClientHandle, ClientMailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let kick = Arc::new(Notify::new());
        let handle = ClientHandle {
            tx,
            kick: Arc::clone(&kick),
            drops: Arc::new(AtomicU64::new(0)),
        };
        (handle, ClientMailbox { rx, kick })
    }

    /// Queue a serialized frame without waiting
    pub fn send(&self, frame: Arc<str>) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                Delivery::Dropped(self.drops.fetch_add(1, Ordering::Relaxed) + 1)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Ask the connection task to close this client
    pub fn kick(&self) {
        self.kick.notify_one();
    }

    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

impl ClientMailbox {
    /// Next queued frame; `None` once every handle is gone
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    /// Signal fired when the room kicks this client
    pub fn kick_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.kick)
    }

    /// Non-blocking receive, for tests and draining
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}
