//! Connected sessions and their display names

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::client::ClientHandle;

/// Opaque per-connection identifier, assigned at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a joined participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub username: Arc<str>,
}

struct Entry {
    session: SessionHandle,
    client: ClientHandle,
}

/// Joined sessions in join order.
///
/// Usernames are not unique. The registry is not synchronized on its own;
/// the room serializes every access.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Vec<Entry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Never fails, duplicate usernames included.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        username: &str,
        client: ClientHandle,
    ) -> SessionHandle {
        let session = SessionHandle {
            connection_id,
            username: Arc::from(username),
        };
        self.entries.push(Entry {
            session: session.clone(),
            client,
        });
        session
    }

    /// Remove a session; unknown ids are ignored
    pub fn deregister(&mut self, connection_id: &ConnectionId) -> Option<SessionHandle> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.session.connection_id == connection_id)?;
        Some(self.entries.remove(index).session)
    }

    /// Roster in join order, duplicates kept
    pub fn list_usernames(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.session.username.to_string())
            .collect()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.entries
            .iter()
            .any(|e| &e.session.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clients(&self) -> impl Iterator<Item = (&SessionHandle, &ClientHandle)> {
        self.entries.iter().map(|e| (&e.session, &e.client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClientHandle {
        ClientHandle::channel(1).0
    }

    #[test]
    fn test_roster_keeps_join_order_and_duplicates() {
        let mut registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();
        registry.register(a, "alice", client());
        registry.register(b, "bob", client());
        registry.register(c, "alice", client());
        assert_eq!(registry.list_usernames(), vec!["alice", "bob", "alice"]);

        registry.deregister(&a);
        assert_eq!(registry.list_usernames(), vec!["bob", "alice"]);
        assert!(!registry.contains(&a));
        assert!(registry.contains(&c));
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let session = registry.register(id, "alice", client());
        assert_eq!(registry.deregister(&id), Some(session));
        assert_eq!(registry.deregister(&id), None);
        assert_eq!(registry.deregister(&ConnectionId::new()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
