//! Presence broadcast and targeted best-effort delivery.

use axum::extract::ws::Message;

use crate::ws::protocol::ServerEvent;
use crate::ws::registry::ConnectionRegistry;

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize server event");
            None
        }
    }
}

/// Send an event to every connected client.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    registry.for_each_sender(|sender| {
        let _ = sender.send(msg.clone());
    });
}

/// Announce the full set of online user ids to all connected clients.
/// Called after every successful register/unregister; no delta computation.
pub fn announce_online_users(registry: &ConnectionRegistry) {
    let online = registry.online_users();
    broadcast_to_all(registry, &ServerEvent::GetOnlineUsers(online));
}

/// Deliver an event to a single user's live connection.
///
/// Returns true if the user was online and the event was handed to their
/// output channel; false if the user is offline (the event is dropped —
/// at-most-once, no queue, no retry). A send failure on a connection that
/// is mid-teardown also counts as a miss.
pub fn deliver_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) -> bool {
    let Some(sender) = registry.lookup(user_id) else {
        return false;
    };
    let Some(msg) = encode(event) else {
        return false;
    };
    sender.send(msg).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn connect(registry: &ConnectionRegistry, user: &str, conn: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(user, conn, tx);
        rx
    }

    fn event_name(msg: &Message) -> String {
        let Message::Text(text) = msg else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        value["event"].as_str().unwrap().to_string()
    }

    #[test]
    fn deliver_misses_offline_user() {
        let registry = ConnectionRegistry::new();
        let delivered = deliver_to_user(&registry, "ghost", &ServerEvent::Typing { from: "a".into() });
        assert!(!delivered);
    }

    #[test]
    fn deliver_reaches_online_user() {
        let registry = ConnectionRegistry::new();
        let mut rx = connect(&registry, "u1", "c1");

        let delivered = deliver_to_user(&registry, "u1", &ServerEvent::Typing { from: "u2".into() });
        assert!(delivered);

        let msg = rx.try_recv().unwrap();
        assert_eq!(event_name(&msg), "typing");
    }

    #[test]
    fn announce_reaches_every_connection_with_full_set() {
        let registry = ConnectionRegistry::new();
        let mut rx1 = connect(&registry, "u1", "c1");
        let mut rx2 = connect(&registry, "u2", "c2");

        announce_online_users(&registry);

        for rx in [&mut rx1, &mut rx2] {
            let Message::Text(text) = rx.try_recv().unwrap() else { panic!("expected text") };
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(value["event"], "getOnlineUsers");
            let mut users: Vec<String> = value["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
            users.sort();
            assert_eq!(users, vec!["u1".to_string(), "u2".to_string()]);
        }
    }
}
