//! Message send/fetch endpoints and real-time fan-out.
//!
//! Send flow: validate -> resolve/create conversation -> persist -> push
//! `newMessage` to both participants' live connections. Persistence always
//! precedes delivery, so history queries issued after a real-time event
//! always include the message. Delivery misses are invisible to the
//! sender — the durable store is the source of truth.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::models::{self, MediaItem, MediaKind, MessageKind, StoredMessage};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::NewMessage;
use crate::ws::broadcast::deliver_to_user;
use crate::ws::protocol::ServerEvent;

/// Maximum attachments per message.
const MAX_MEDIA_PER_MESSAGE: usize = 5;

#[derive(Debug, Deserialize)]
pub struct MediaInput {
    pub url: String,
    /// Optional explicit kind tag; inferred from the URL when absent.
    pub kind: Option<MediaKind>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Text body; trimmed before the empty check.
    pub message: Option<String>,
    /// Already-uploaded attachment URLs (media bytes live in an external
    /// store, never here).
    #[serde(default)]
    pub media: Vec<MediaInput>,
}

/// POST /api/messages/{receiver_id} — send a message.
/// At least one of body or attachments is required; returns the created
/// message with its derived kind.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(receiver_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<StoredMessage>), ApiError> {
    let sender_id = claims.sub;

    if sender_id == receiver_id {
        return Err(ApiError::validation("cannot message yourself"));
    }

    let text = body.message.unwrap_or_default().trim().to_string();
    if text.is_empty() && body.media.is_empty() {
        return Err(ApiError::validation(
            "either text or media is required to send a message",
        ));
    }
    if body.media.len() > MAX_MEDIA_PER_MESSAGE {
        return Err(ApiError::validation(format!(
            "at most {MAX_MEDIA_PER_MESSAGE} media attachments per message"
        )));
    }

    let media: Vec<MediaItem> = body
        .media
        .into_iter()
        .map(|input| {
            let kind = input
                .kind
                .unwrap_or_else(|| MediaKind::infer_from_url(&input.url));
            MediaItem { url: input.url, kind }
        })
        .collect();

    // Derived once, stored immutably
    let kind = MessageKind::derive(!text.is_empty(), !media.is_empty());

    let stored = {
        let db = state.db.clone();
        let store = state.store.clone();
        let sender_id = sender_id.clone();
        let receiver_id = receiver_id.clone();

        tokio::task::spawn_blocking(move || {
            {
                let conn = crate::db::lock(&db)?;
                if !models::user_exists(&conn, &receiver_id)? {
                    return Err(ApiError::not_found("user"));
                }
            }

            let conversation = store.conversation_for_pair(&sender_id, &receiver_id)?;
            store.append_message(
                &conversation.id,
                NewMessage {
                    sender_id,
                    receiver_id,
                    body: text,
                    media,
                    kind,
                },
            )
        })
        .await??
    };

    // Fan out to both participants. Self-delivery lets the sender's other
    // open session observe the send. Misses are non-fatal — the message is
    // already durably stored.
    let event = ServerEvent::NewMessage(stored.clone());
    if !deliver_to_user(&state.connections, &receiver_id, &event) {
        tracing::debug!(receiver_id = %receiver_id, "receiver offline, real-time delivery skipped");
    }
    deliver_to_user(&state.connections, &stored.sender_id, &event);

    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/messages/latest — the newest message of each conversation the
/// caller participates in, newest first (sidebar previews).
///
/// Registered before /api/messages/{id} so "latest" never parses as a
/// user id.
pub async fn latest_messages(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let store = state.store.clone();
    let user_id = claims.sub;

    let messages =
        tokio::task::spawn_blocking(move || store.latest_messages_for_user(&user_id)).await??;

    Ok(Json(messages))
}

/// GET /api/messages/{other_user_id} — chronological history for the pair.
/// An absent conversation is an empty list, not an error.
pub async fn get_messages(
    State(state): State<AppState>,
    claims: Claims,
    Path(other_user_id): Path<String>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let store = state.store.clone();
    let user_id = claims.sub;

    let messages = tokio::task::spawn_blocking(move || {
        match store.find_conversation(&user_id, &other_user_id)? {
            Some(conversation) => store.list_messages(&conversation.id),
            None => Ok(Vec::new()),
        }
    })
    .await??;

    Ok(Json(messages))
}
