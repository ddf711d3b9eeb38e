//! Wire protocol for the real-time channel.
//!
//! JSON text frames tagged `{"event": ..., "data": ...}`. Event names are
//! part of the client contract and must not change.

use serde::{Deserialize, Serialize};

use crate::db::models::StoredMessage;
use crate::state::AppState;
use crate::ws::broadcast::deliver_to_user;

/// Events pushed from server to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full set of currently-connected user ids, resent on every change.
    GetOnlineUsers(Vec<String>),
    /// A freshly persisted message, fanned out to both participants.
    NewMessage(StoredMessage),
    Typing { from: String },
    StopTyping { from: String },
}

/// Events clients send to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Typing { receiver_id: String },
    StopTyping { receiver_id: String },
}

/// Handle one incoming text frame from an authenticated connection.
/// Typing indicators are forwarded to the receiver's connection when
/// online and dropped otherwise — never queued, never replayed.
pub fn handle_client_event(state: &AppState, user_id: &str, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(
                user_id = %user_id,
                error = %err,
                "ignoring malformed client event"
            );
            return;
        }
    };

    match event {
        ClientEvent::Typing { receiver_id } => {
            deliver_to_user(
                &state.connections,
                &receiver_id,
                &ServerEvent::Typing {
                    from: user_id.to_string(),
                },
            );
        }
        ClientEvent::StopTyping { receiver_id } => {
            deliver_to_user(
                &state.connections,
                &receiver_id,
                &ServerEvent::StopTyping {
                    from: user_id.to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_names_match_contract() {
        let online = serde_json::to_value(ServerEvent::GetOnlineUsers(vec!["u1".into()])).unwrap();
        assert_eq!(online["event"], "getOnlineUsers");
        assert_eq!(online["data"][0], "u1");

        let typing = serde_json::to_value(ServerEvent::Typing { from: "u2".into() }).unwrap();
        assert_eq!(typing["event"], "typing");
        assert_eq!(typing["data"]["from"], "u2");

        let stop = serde_json::to_value(ServerEvent::StopTyping { from: "u2".into() }).unwrap();
        assert_eq!(stop["event"], "stopTyping");
    }

    #[test]
    fn client_event_parses_camel_case() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"typing","data":{"receiverId":"u9"}}"#).unwrap();
        match event {
            ClientEvent::Typing { receiver_id } => assert_eq!(receiver_id, "u9"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
