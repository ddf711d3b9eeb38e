//! Friend and pending-request listings.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::models::UserProfile;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/friends — confirmed friends of the caller.
pub async fn list_friends(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let friends = tokio::task::spawn_blocking(move || {
        let conn = crate::db::lock(&db)?;
        // The edge is normalized; the friend is whichever side isn't the caller
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             JOIN friendships f ON users.id = CASE WHEN f.user_a = ?1 THEN f.user_b ELSE f.user_a END
             WHERE f.user_a = ?1 OR f.user_b = ?1
             ORDER BY users.user_name",
            UserProfile::COLUMNS
        ))?;
        let friends = stmt
            .query_map(rusqlite::params![user_id], UserProfile::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, ApiError>(friends)
    })
    .await??;

    Ok(Json(friends))
}

#[derive(Debug, Serialize)]
pub struct PendingRequests {
    /// Users who sent the caller a request
    pub received: Vec<UserProfile>,
    /// Users the caller sent a request to
    pub sent: Vec<UserProfile>,
}

/// GET /api/friends/requests — pending requests in both directions.
pub async fn list_requests(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<PendingRequests>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let pending = tokio::task::spawn_blocking(move || {
        let conn = crate::db::lock(&db)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             JOIN friend_requests r ON r.sender_id = users.id
             WHERE r.receiver_id = ?1
             ORDER BY r.created_at DESC",
            UserProfile::COLUMNS
        ))?;
        let received = stmt
            .query_map(rusqlite::params![user_id], UserProfile::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             JOIN friend_requests r ON r.receiver_id = users.id
             WHERE r.sender_id = ?1
             ORDER BY r.created_at DESC",
            UserProfile::COLUMNS
        ))?;
        let sent = stmt
            .query_map(rusqlite::params![user_id], UserProfile::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok::<_, ApiError>(PendingRequests { received, sent })
    })
    .await??;

    Ok(Json(pending))
}
