use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Users and friend graph

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    user_name TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    gender TEXT NOT NULL,
    avatar_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per directional pending friend request.
CREATE TABLE friend_requests (
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (sender_id, receiver_id),
    FOREIGN KEY (sender_id) REFERENCES users(id),
    FOREIGN KEY (receiver_id) REFERENCES users(id)
);

CREATE INDEX idx_friend_requests_receiver ON friend_requests(receiver_id);

-- One row per confirmed friendship, participant order normalized.
-- Symmetry (A friends B <=> B friends A) holds structurally.
CREATE TABLE friendships (
    user_a TEXT NOT NULL,
    user_b TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_a, user_b),
    CHECK (user_a < user_b),
    FOREIGN KEY (user_a) REFERENCES users(id),
    FOREIGN KEY (user_b) REFERENCES users(id)
);

CREATE INDEX idx_friendships_b ON friendships(user_b);
",
        ),
        M::up(
            "-- Migration 2: Conversations and messages

-- One conversation per unordered participant pair, order normalized.
-- The UNIQUE constraint absorbs the two-first-messages creation race.
CREATE TABLE conversations (
    id TEXT PRIMARY KEY,
    participant_a TEXT NOT NULL,
    participant_b TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_message_at TEXT,
    UNIQUE (participant_a, participant_b),
    CHECK (participant_a < participant_b),
    FOREIGN KEY (participant_a) REFERENCES users(id),
    FOREIGN KEY (participant_b) REFERENCES users(id)
);

CREATE INDEX idx_conversations_a ON conversations(participant_a);
CREATE INDEX idx_conversations_b ON conversations(participant_b);

-- Messages are immutable once created; insertion order is chronological.
CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    kind TEXT NOT NULL CHECK (kind IN ('text', 'media', 'mixed')),
    created_at TEXT NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id),
    FOREIGN KEY (receiver_id) REFERENCES users(id)
);

CREATE INDEX idx_messages_conv_time ON messages(conversation_id, created_at);

-- Ordered media attachments per message (URL + kind tag; bytes live
-- in an external media store, never here).
CREATE TABLE message_media (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL,
    url TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('image', 'video', 'audio', 'document', 'other')),
    position INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE INDEX idx_message_media_message ON message_media(message_id);
",
        ),
    ])
}
