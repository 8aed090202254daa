use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::{ClientHandle, Delivery};
use crate::config::RoomConfig;
use crate::error::Result;
use crate::events::{ChatEvent, EventDraft, ServerEvent};
use crate::history::HistoryBuffer;
use crate::registry::{ConnectionId, ConnectionRegistry, SessionHandle};

struct RoomState {
    registry: ConnectionRegistry,
    history: HistoryBuffer,
    last_timestamp: Option<DateTime<Utc>>,
}

/// The shared room: membership, history and fan-out.
///
/// Every mutation runs under one lock, and frames are queued to recipients
/// while that lock is held, so each client sees events in history order.
/// Queueing never waits on a recipient.
pub struct ChatRoom {
    state: Mutex<RoomState>,
    config: RoomConfig,
}

impl ChatRoom {
    /// Create an empty room
    pub fn new(config: RoomConfig) -> Result<Self> {
        config.validate()?;
        let history = HistoryBuffer::new(config.history_capacity)?;

        Ok(Self {
            state: Mutex::new(RoomState {
                registry: ConnectionRegistry::new(),
                history,
                last_timestamp: None,
            }),
            config,
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Register a participant and onboard them.
    ///
    /// The joiner gets `chat_history` then `user_list`; everyone else gets a
    /// join notice and the new roster. Done atomically, so no live event can
    /// slip between the joiner's history snapshot and its registration.
    pub fn join(
        &self,
        connection_id: ConnectionId,
        username: &str,
        client: ClientHandle,
    ) -> SessionHandle {
        let mut state = self.state.lock();

        let session = state.registry.register(connection_id, username, client.clone());
        let history = state.history.snapshot();
        let users = state.registry.list_usernames();

        self.deliver(&client, &ServerEvent::ChatHistory { history });
        self.deliver(
            &client,
            &ServerEvent::UserList {
                users: users.clone(),
            },
        );

        let notice = Self::stamp(
            &mut state,
            EventDraft::System {
                message: format!("{} joined", username),
            },
        );
        self.fan_out(&state, &ServerEvent::for_chat(notice), Some(&connection_id));
        self.fan_out(&state, &ServerEvent::UserList { users }, Some(&connection_id));

        tracing::info!(
            connection = %connection_id,
            username,
            members = state.registry.len(),
            "Participant joined"
        );
        session
    }

    /// Deregister a participant and announce the departure.
    ///
    /// Unknown or already-removed ids are a no-op.
    pub fn leave(&self, connection_id: &ConnectionId) -> Option<SessionHandle> {
        let mut state = self.state.lock();

        let session = state.registry.deregister(connection_id)?;
        let notice = Self::stamp(
            &mut state,
            EventDraft::System {
                message: format!("{} left", session.username),
            },
        );
        self.fan_out(&state, &ServerEvent::for_chat(notice), None);
        let users = state.registry.list_usernames();
        self.fan_out(&state, &ServerEvent::UserList { users }, None);

        tracing::info!(
            connection = %connection_id,
            username = %session.username,
            members = state.registry.len(),
            "Participant left"
        );
        Some(session)
    }

    /// Stamp, record and fan out an event.
    ///
    /// Non-system events are appended to history before any recipient sees
    /// them. `exclude` skips one connection (the sender, when not echoing).
    pub fn broadcast(&self, draft: EventDraft, exclude: Option<&ConnectionId>) -> ChatEvent {
        let mut state = self.state.lock();

        let event = Self::stamp(&mut state, draft);
        if !event.is_system() {
            if let Some(evicted) = state.history.append(event.clone()) {
                tracing::trace!(timestamp = %evicted.timestamp(), "History full, evicted oldest");
            }
        }
        self.fan_out(&state, &ServerEvent::for_chat(event.clone()), exclude);
        event
    }

    /// Broadcast a text message from `session`, honoring the text echo policy
    pub fn send_text(&self, session: &SessionHandle, message: String) -> ChatEvent {
        let exclude = (!self.config.echo_text).then_some(&session.connection_id);
        self.broadcast(
            EventDraft::Text {
                username: session.username.to_string(),
                message,
            },
            exclude,
        )
    }

    /// Broadcast a voice clip from `session`, honoring the voice echo policy
    pub fn send_voice(&self, session: &SessionHandle, audio: Vec<u8>) -> ChatEvent {
        let exclude = (!self.config.echo_voice).then_some(&session.connection_id);
        self.broadcast(
            EventDraft::Voice {
                username: session.username.to_string(),
                audio,
            },
            exclude,
        )
    }

    /// Current roster in join order
    pub fn roster(&self) -> Vec<String> {
        self.state.lock().registry.list_usernames()
    }

    /// Copy of the retained history
    pub fn history(&self) -> Vec<ChatEvent> {
        self.state.lock().history.snapshot()
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    // Helper functions

    /// Accept time, clamped so history timestamps never go backwards
    fn stamp(state: &mut RoomState, draft: EventDraft) -> ChatEvent {
        let now = Utc::now();
        let timestamp = match state.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);
        draft.stamp(timestamp)
    }

    fn fan_out(&self, state: &RoomState, event: &ServerEvent, exclude: Option<&ConnectionId>) {
        let frame: Arc<str> = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!("Failed to serialize broadcast: {}", e);
                return;
            }
        };

        let mut recipients = 0usize;
        for (session, client) in state.registry.clients() {
            if Some(&session.connection_id) == exclude {
                continue;
            }
            recipients += 1;
            self.push(session, client, Arc::clone(&frame));
        }
        tracing::debug!(recipients, "Broadcast event");
    }

    fn deliver(&self, client: &ClientHandle, event: &ServerEvent) {
        match event.to_json() {
            Ok(json) => {
                if let Delivery::Dropped(_) = client.send(Arc::from(json)) {
                    tracing::warn!("Onboarding frame dropped, client queue full");
                }
            }
            Err(e) => tracing::error!("Failed to serialize onboarding frame: {}", e),
        }
    }

    fn push(&self, session: &SessionHandle, client: &ClientHandle, frame: Arc<str>) {
        match client.send(frame) {
            Delivery::Queued => {}
            Delivery::Dropped(drops) if drops >= self.config.max_send_drops => {
                tracing::warn!(
                    connection = %session.connection_id,
                    username = %session.username,
                    drops,
                    "Disconnecting slow client"
                );
                client.kick();
            }
            Delivery::Dropped(drops) => {
                tracing::warn!(
                    connection = %session.connection_id,
                    username = %session.username,
                    drops,
                    "Client queue full, frame dropped"
                );
            }
            Delivery::Closed => {
                // Disconnect is already under way; the connection task deregisters.
                tracing::debug!(connection = %session.connection_id, "Client gone, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientMailbox;

    fn room(config: RoomConfig) -> ChatRoom {
        ChatRoom::new(config).unwrap()
    }

    fn drain(mailbox: &mut ClientMailbox) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(frame) = mailbox.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    fn member(room: &ChatRoom, name: &str) -> (SessionHandle, ClientMailbox) {
        let (client, mailbox) = ClientHandle::channel(64);
        let session = room.join(ConnectionId::new(), name, client);
        (session, mailbox)
    }

    fn text_of(event: &ServerEvent) -> Option<&str> {
        match event {
            ServerEvent::ChatMessage(ChatEvent::Text { message, .. }) => Some(message),
            _ => None,
        }
    }

    #[test]
    fn test_joiner_receives_history_then_roster() {
        let room = room(RoomConfig::default());
        let (alice, _alice_rx) = member(&room, "alice");
        room.send_text(&alice, "one".to_string());
        room.send_text(&alice, "two".to_string());

        let (_bob, mut bob_rx) = member(&room, "bob");
        let events = drain(&mut bob_rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            ServerEvent::ChatHistory { history } => {
                let texts: Vec<_> = history
                    .iter()
                    .map(|e| match e {
                        ChatEvent::Text { message, .. } => message.as_str(),
                        _ => "",
                    })
                    .collect();
                assert_eq!(texts, vec!["one", "two"]);
            }
            other => panic!("expected history, got {:?}", other),
        }
        assert_eq!(
            events[1],
            ServerEvent::UserList {
                users: vec!["alice".to_string(), "bob".to_string()]
            }
        );
    }

    #[test]
    fn test_others_get_join_notice_and_roster() {
        let room = room(RoomConfig::default());
        let (_alice, mut alice_rx) = member(&room, "alice");
        drain(&mut alice_rx);

        member(&room, "bob");
        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            ServerEvent::ChatMessage(ChatEvent::System { message, .. }) => {
                assert_eq!(message, "bob joined")
            }
            other => panic!("expected join notice, got {:?}", other),
        }
        assert_eq!(
            events[1],
            ServerEvent::UserList {
                users: vec!["alice".to_string(), "bob".to_string()]
            }
        );
    }

    #[test]
    fn test_system_events_stay_out_of_history() {
        let room = room(RoomConfig::default());
        let (alice, _a) = member(&room, "alice");
        member(&room, "bob");
        room.send_text(&alice, "hi".to_string());

        let history = room.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].username(), Some("alice"));
    }

    #[test]
    fn test_text_not_echoed_voice_echoed_by_default() {
        let room = room(RoomConfig::default());
        let (alice, mut alice_rx) = member(&room, "alice");
        let (_bob, mut bob_rx) = member(&room, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        room.send_text(&alice, "hi".to_string());
        room.send_voice(&alice, vec![1, 2, 3]);

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 1);
        assert!(matches!(to_alice[0], ServerEvent::VoiceMessage(_)));

        let to_bob = drain(&mut bob_rx);
        assert_eq!(to_bob.len(), 2);
        assert_eq!(text_of(&to_bob[0]), Some("hi"));
        assert!(matches!(to_bob[1], ServerEvent::VoiceMessage(_)));
    }

    #[test]
    fn test_echo_policy_is_configurable() {
        let room = room(RoomConfig {
            echo_text: true,
            echo_voice: false,
            ..Default::default()
        });
        let (alice, mut alice_rx) = member(&room, "alice");
        drain(&mut alice_rx);

        room.send_text(&alice, "hi".to_string());
        room.send_voice(&alice, vec![9]);

        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(text_of(&events[0]), Some("hi"));
    }

    #[test]
    fn test_history_order_and_timestamps_monotonic() {
        let room = room(RoomConfig::default());
        let (alice, _a) = member(&room, "alice");
        for n in 0..20 {
            room.send_text(&alice, format!("m{}", n));
        }
        let history = room.history();
        for pair in history.windows(2) {
            assert!(pair[0].timestamp() <= pair[1].timestamp());
        }
        let last = match history.last() {
            Some(ChatEvent::Text { message, .. }) => message.clone(),
            _ => String::new(),
        };
        assert_eq!(last, "m19");
    }

    #[test]
    fn test_history_capacity_respected() {
        let room = room(RoomConfig {
            history_capacity: 3,
            ..Default::default()
        });
        let (alice, _a) = member(&room, "alice");
        for n in 0..10 {
            room.send_text(&alice, format!("m{}", n));
        }
        assert_eq!(room.history_len(), 3);
    }

    #[test]
    fn test_leave_announces_and_is_idempotent() {
        let room = room(RoomConfig::default());
        let (_alice, mut alice_rx) = member(&room, "alice");
        let (bob, _bob_rx) = member(&room, "bob");
        drain(&mut alice_rx);

        assert!(room.leave(&bob.connection_id).is_some());
        assert!(room.leave(&bob.connection_id).is_none());
        assert!(room.leave(&ConnectionId::new()).is_none());

        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            ServerEvent::ChatMessage(ChatEvent::System { message, .. }) => {
                assert_eq!(message, "bob left")
            }
            other => panic!("expected leave notice, got {:?}", other),
        }
        assert_eq!(
            events[1],
            ServerEvent::UserList {
                users: vec!["alice".to_string()]
            }
        );
        assert_eq!(room.roster(), vec!["alice"]);
    }

    #[test]
    fn test_stalled_recipient_does_not_block_others() {
        let room = room(RoomConfig {
            max_send_drops: 3,
            ..Default::default()
        });
        let (alice, mut alice_rx) = member(&room, "alice");

        // The smallest queue, already filled by history and roster on join.
        let (slow_client, _slow_rx) = ClientHandle::channel(2);
        room.join(ConnectionId::new(), "slow", slow_client.clone());
        let (_bob, mut bob_rx) = member(&room, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        for n in 0..5 {
            room.send_text(&alice, format!("m{}", n));
        }
        assert_eq!(drain(&mut bob_rx).len(), 5);
        assert!(slow_client.drop_count() >= 3);
    }

    #[test]
    fn test_smallest_queue_holds_onboarding() {
        let room = room(RoomConfig::default());
        let (alice, _alice_rx) = member(&room, "alice");
        room.send_text(&alice, "hello".to_string());

        let (client, mut mailbox) = ClientHandle::channel(2);
        room.join(ConnectionId::new(), "bob", client.clone());

        let events = drain(&mut mailbox);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ServerEvent::ChatHistory { .. }));
        assert_eq!(
            events[1],
            ServerEvent::UserList {
                users: vec!["alice".to_string(), "bob".to_string()]
            }
        );
        assert_eq!(client.drop_count(), 0);
    }
}
