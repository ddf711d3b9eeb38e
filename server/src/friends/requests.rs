//! Friend request lifecycle.
//!
//! The friend graph lives in two tables: directional pending rows in
//! friend_requests and one normalized row per confirmed edge in
//! friendships. Every state change here runs inside a single SQLite
//! transaction, so the symmetric-friendship invariant can never be
//! observed half-applied.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::models;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RequestOutcome {
    pub message: String,
    /// Resulting relationship: "sent" or "friends"
    pub status: String,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn normalized(a: &str, b: &str) -> (String, String) {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn are_friends(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<bool> {
    let (lo, hi) = normalized(a, b);
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM friendships WHERE user_a = ?1 AND user_b = ?2",
        rusqlite::params![lo, hi],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn request_exists(conn: &Connection, sender: &str, receiver: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2",
        rusqlite::params![sender, receiver],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Confirm a friendship: drop any pending rows in either direction and
/// insert the normalized edge. Caller provides the open transaction.
fn confirm_friendship(tx: &Connection, a: &str, b: &str) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM friend_requests
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
        rusqlite::params![a, b],
    )?;
    let (lo, hi) = normalized(a, b);
    tx.execute(
        "INSERT INTO friendships (user_a, user_b, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![lo, hi, now()],
    )?;
    Ok(())
}

/// POST /api/friends/request/{id} — send a friend request.
/// If the target already has a pending request toward the caller, the two
/// requests resolve into a friendship immediately (auto-accept).
pub async fn send_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(target_id): Path<String>,
) -> Result<Json<RequestOutcome>, ApiError> {
    let sender_id = claims.sub;

    if sender_id == target_id {
        return Err(ApiError::validation("cannot send a request to yourself"));
    }

    let db = state.db.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = crate::db::lock(&db)?;
        let tx = conn.transaction()?;

        if !models::user_exists(&tx, &target_id)? {
            return Err(ApiError::not_found("user"));
        }
        if are_friends(&tx, &sender_id, &target_id)? {
            return Err(ApiError::conflict("already friends"));
        }
        if request_exists(&tx, &sender_id, &target_id)? {
            return Err(ApiError::conflict("request already sent"));
        }

        let outcome = if request_exists(&tx, &target_id, &sender_id)? {
            // Mutual interest — auto-accept instead of leaving two
            // crossed pending requests
            confirm_friendship(&tx, &sender_id, &target_id)?;
            RequestOutcome {
                message: "friend request accepted".to_string(),
                status: "friends".to_string(),
            }
        } else {
            tx.execute(
                "INSERT INTO friend_requests (sender_id, receiver_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, target_id, now()],
            )?;
            RequestOutcome {
                message: "friend request sent".to_string(),
                status: "sent".to_string(),
            }
        };

        tx.commit()?;
        Ok(outcome)
    })
    .await??;

    Ok(Json(outcome))
}

/// POST /api/friends/accept/{id} — accept a pending request from {id}.
pub async fn accept_request(
    State(state): State<AppState>,
    claims: Claims,
    Path(sender_id): Path<String>,
) -> Result<Json<RequestOutcome>, ApiError> {
    let receiver_id = claims.sub;

    let db = state.db.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut conn = crate::db::lock(&db)?;
        let tx = conn.transaction()?;

        if !models::user_exists(&tx, &sender_id)? {
            return Err(ApiError::not_found("user"));
        }
        if !request_exists(&tx, &sender_id, &receiver_id)? {
            return Err(ApiError::validation("no request from this user"));
        }

        confirm_friendship(&tx, &sender_id, &receiver_id)?;
        tx.commit()?;

        Ok(RequestOutcome {
            message: "friend request accepted".to_string(),
            status: "friends".to_string(),
        })
    })
    .await??;

    Ok(Json(outcome))
}
