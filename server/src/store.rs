//! Durable store for conversations and messages.
//!
//! The chat core talks to this interface only — it never issues its own
//! SQL. The store is the source of truth for message history; real-time
//! delivery is a best-effort convenience layer on top of it.
//!
//! Conversations are one-to-one. Participant order is normalized
//! (lexicographically smaller id is always participant_a) so at most one
//! conversation exists per unordered pair; the UNIQUE constraint absorbs
//! the race when two first messages create the pair simultaneously.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::db::models::{Conversation, MediaItem, MediaKind, MessageKind, StoredMessage};
use crate::db::{self, DbPool};
use crate::error::ApiError;

/// Input for appending a message. The derived kind is computed by the
/// caller once, before persistence.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub media: Vec<MediaItem>,
    pub kind: MessageKind,
}

#[derive(Clone)]
pub struct ConversationStore {
    db: DbPool,
}

impl ConversationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Normalize an unordered participant pair to storage order.
    fn normalize_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn now() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Find the conversation for an unordered pair, if any.
    pub fn find_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, ApiError> {
        let conn = db::lock(&self.db)?;
        let (a, b) = Self::normalize_pair(user_a, user_b);

        let result = conn.query_row(
            "SELECT id, participant_a, participant_b, created_at, last_message_at
             FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
            rusqlite::params![a, b],
            conversation_from_row,
        );

        match result {
            Ok(conv) => Ok(Some(conv)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a conversation for an unordered pair with an empty message list.
    pub fn create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, ApiError> {
        let conn = db::lock(&self.db)?;
        let (a, b) = Self::normalize_pair(user_a, user_b);
        let id = Uuid::now_v7().to_string();
        let now = Self::now();

        conn.execute(
            "INSERT INTO conversations (id, participant_a, participant_b, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, a, b, now],
        )?;

        Ok(Conversation {
            id,
            participant_a: a.to_string(),
            participant_b: b.to_string(),
            created_at: now,
            last_message_at: None,
        })
    }

    /// Resolve or lazily create the conversation for a pair.
    /// A concurrent create loses the UNIQUE race and falls back to the
    /// winner's row.
    pub fn conversation_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, ApiError> {
        if let Some(conv) = self.find_conversation(user_a, user_b)? {
            return Ok(conv);
        }

        match self.create_conversation(user_a, user_b) {
            Ok(conv) => Ok(conv),
            Err(ApiError::Store(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                self.find_conversation(user_a, user_b)?
                    .ok_or_else(|| ApiError::internal("conversation vanished after insert race"))
            }
            Err(err) => Err(err),
        }
    }

    /// Append an immutable message to a conversation.
    /// Message row, media rows, and the conversation's last-activity bump
    /// commit in a single transaction.
    pub fn append_message(
        &self,
        conversation_id: &str,
        new: NewMessage,
    ) -> Result<StoredMessage, ApiError> {
        let mut conn = db::lock(&self.db)?;
        let tx = conn.transaction()?;

        let id = Uuid::now_v7().to_string();
        let now = Self::now();

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, body, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                id,
                conversation_id,
                new.sender_id,
                new.receiver_id,
                new.body,
                new.kind.as_str(),
                now
            ],
        )?;

        for (position, item) in new.media.iter().enumerate() {
            tx.execute(
                "INSERT INTO message_media (message_id, url, kind, position)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, item.url, item.kind.as_str(), position as i64],
            )?;
        }

        tx.execute(
            "UPDATE conversations SET last_message_at = ?1 WHERE id = ?2",
            rusqlite::params![now, conversation_id],
        )?;

        tx.commit()?;

        Ok(StoredMessage {
            id,
            conversation_id: conversation_id.to_string(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            message: new.body,
            media: new.media,
            kind: new.kind,
            created_at: now,
        })
    }

    /// All messages of a conversation in chronological order.
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, ApiError> {
        let conn = db::lock(&self.db)?;

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender_id, receiver_id, body, kind, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let mut messages: Vec<StoredMessage> = stmt
            .query_map(rusqlite::params![conversation_id], message_from_row)?
            .collect::<Result<_, _>>()?;

        // Attach media in one pass over the conversation's attachment rows
        let mut media_stmt = conn.prepare(
            "SELECT mm.message_id, mm.url, mm.kind
             FROM message_media mm
             JOIN messages m ON m.id = mm.message_id
             WHERE m.conversation_id = ?1
             ORDER BY mm.message_id, mm.position",
        )?;

        let mut by_message: HashMap<String, Vec<MediaItem>> = HashMap::new();
        let rows = media_stmt.query_map(rusqlite::params![conversation_id], |row| {
            let message_id: String = row.get(0)?;
            let url: String = row.get(1)?;
            let kind: String = row.get(2)?;
            Ok((message_id, url, kind))
        })?;
        for row in rows {
            let (message_id, url, kind) = row?;
            by_message.entry(message_id).or_default().push(MediaItem {
                url,
                kind: MediaKind::from_str(&kind).unwrap_or(MediaKind::Other),
            });
        }

        for message in &mut messages {
            if let Some(media) = by_message.remove(&message.id) {
                message.media = media;
            }
        }

        Ok(messages)
    }

    /// All conversations a user participates in, most recent activity first.
    pub fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ApiError> {
        let conn = db::lock(&self.db)?;

        let mut stmt = conn.prepare(
            "SELECT id, participant_a, participant_b, created_at, last_message_at
             FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY CASE WHEN last_message_at IS NULL THEN 1 ELSE 0 END,
                      last_message_at DESC,
                      created_at DESC",
        )?;

        let conversations = stmt
            .query_map(rusqlite::params![user_id], conversation_from_row)?
            .collect::<Result<_, _>>()?;

        Ok(conversations)
    }

    /// The newest message of each conversation the user participates in,
    /// newest first. Backs the conversation-list preview endpoint.
    pub fn latest_messages_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let ids: Vec<String> = {
            let conn = db::lock(&self.db)?;
            // Message ids are UUIDv7 — time-ordered — so MAX(id) is the
            // newest message even when created_at timestamps tie.
            let mut stmt = conn.prepare(
                "SELECT MAX(m.id) AS id
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE c.participant_a = ?1 OR c.participant_b = ?1
                 GROUP BY m.conversation_id
                 ORDER BY id DESC",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![user_id], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            ids
        };

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(message) = self.load_message(&id)? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Load one message with its attachments.
    fn load_message(&self, message_id: &str) -> Result<Option<StoredMessage>, ApiError> {
        let conn = db::lock(&self.db)?;

        let result = conn.query_row(
            "SELECT id, conversation_id, sender_id, receiver_id, body, kind, created_at
             FROM messages WHERE id = ?1",
            rusqlite::params![message_id],
            message_from_row,
        );

        let mut message = match result {
            Ok(message) => message,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut stmt = conn.prepare(
            "SELECT url, kind FROM message_media WHERE message_id = ?1 ORDER BY position",
        )?;
        let media = stmt.query_map(rusqlite::params![message_id], |row| {
            let url: String = row.get(0)?;
            let kind: String = row.get(1)?;
            Ok(MediaItem {
                url,
                kind: MediaKind::from_str(&kind).unwrap_or(MediaKind::Other),
            })
        })?;
        message.media = media.collect::<Result<_, _>>()?;

        Ok(Some(message))
    }
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        created_at: row.get(3)?,
        last_message_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let kind: String = row.get(5)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        message: row.get(4)?,
        media: Vec::new(),
        kind: MessageKind::from_str(&kind).unwrap_or(MessageKind::Text),
        created_at: row.get(6)?,
    })
}
