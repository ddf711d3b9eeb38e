//! Row types shared across handlers, plus the pure kind-derivation helpers.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Public user profile (never carries the password hash).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub user_name: String,
    pub full_name: String,
    pub gender: String,
    pub avatar_url: String,
}

impl UserProfile {
    pub const COLUMNS: &'static str = "id, user_name, full_name, gender, avatar_url";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_name: row.get(1)?,
            full_name: row.get(2)?,
            gender: row.get(3)?,
            avatar_url: row.get(4)?,
        })
    }
}

/// Check that a user id exists.
pub fn user_exists(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?1",
        rusqlite::params![user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Load a user profile by id.
pub fn find_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserProfile>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", UserProfile::COLUMNS),
        rusqlite::params![user_id],
        UserProfile::from_row,
    )
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    })
}

/// Derived message kind, computed once at creation and stored immutably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Media,
    Mixed,
}

impl MessageKind {
    /// Pure function of (body present, attachments present).
    pub fn derive(has_body: bool, has_media: bool) -> Self {
        match (has_body, has_media) {
            (true, true) => Self::Mixed,
            (false, true) => Self::Media,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Media => "media",
            Self::Mixed => "mixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "media" => Some(Self::Media),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// Kind tag for a single media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Classify an attachment by the mime type guessed from its URL path.
    /// Unknown or unguessable types fall back to `Other`.
    pub fn infer_from_url(url: &str) -> Self {
        // Strip query/fragment so extensions like ".png?w=200" still resolve
        let path = url.split(['?', '#']).next().unwrap_or(url);

        let Some(mime) = mime_guess::from_path(path).first() else {
            return Self::Other;
        };

        let top = mime.type_();
        if top == mime_guess::mime::IMAGE {
            Self::Image
        } else if top == mime_guess::mime::VIDEO {
            Self::Video
        } else if top == mime_guess::mime::AUDIO {
            Self::Audio
        } else {
            let subtype = mime.subtype().as_str();
            if mime == mime_guess::mime::APPLICATION_PDF
                || subtype.contains("word")
                || subtype.contains("excel")
                || subtype.contains("spreadsheet")
            {
                Self::Document
            } else {
                Self::Other
            }
        }
    }
}

/// One media attachment as stored and as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub kind: MediaKind,
}

/// A persisted message, immutable once created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub media: Vec<MediaItem>,
    pub kind: MessageKind,
    pub created_at: String,
}

/// A conversation between exactly two participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub created_at: String,
    pub last_message_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_derivation_covers_all_combinations() {
        assert_eq!(MessageKind::derive(true, true), MessageKind::Mixed);
        assert_eq!(MessageKind::derive(false, true), MessageKind::Media);
        assert_eq!(MessageKind::derive(true, false), MessageKind::Text);
        // Unreachable through the API (validation rejects it) but the
        // function itself defaults to text.
        assert_eq!(MessageKind::derive(false, false), MessageKind::Text);
    }

    #[test]
    fn media_kind_inference() {
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/a.png"), MediaKind::Image);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/b.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/c.mp3"), MediaKind::Audio);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/d.pdf"), MediaKind::Document);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/e.docx"), MediaKind::Document);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/f.bin"), MediaKind::Other);
        assert_eq!(MediaKind::infer_from_url("https://cdn.example/no-extension"), MediaKind::Other);
    }

    #[test]
    fn media_kind_inference_ignores_query_string() {
        assert_eq!(
            MediaKind::infer_from_url("https://cdn.example/a.jpg?w=200&h=100"),
            MediaKind::Image
        );
    }
}
