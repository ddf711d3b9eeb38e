//! Profile listing, editing, and search.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::auth::password;
use crate::db::models::UserProfile;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/users — all users except the caller, for the contact list.
pub async fn list_other_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let users = tokio::task::spawn_blocking(move || {
        let conn = crate::db::lock(&db)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id != ?1 ORDER BY user_name",
            UserProfile::COLUMNS
        ))?;
        let users = stmt
            .query_map(rusqlite::params![user_id], UserProfile::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, ApiError>(users)
    })
    .await??;

    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub user_name: Option<String>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
}

/// PUT /api/users/profile — partial update of the caller's profile.
/// Absent fields keep their current values.
pub async fn update_profile(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let new_password_hash = match body.password.as_deref() {
        Some(p) if !p.is_empty() => Some(password::hash_password(p)?),
        _ => None,
    };

    let db = state.db.clone();
    let user_id = claims.sub;

    let user = tokio::task::spawn_blocking(move || {
        let conn = crate::db::lock(&db)?;

        let Some(current) = crate::db::models::find_user(&conn, &user_id)? else {
            return Err(ApiError::not_found("user"));
        };

        let user_name = body
            .user_name
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or(current.user_name);
        let full_name = body
            .full_name
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or(current.full_name);
        let gender = body.gender.unwrap_or(current.gender);
        let avatar_url = body.avatar_url.unwrap_or(current.avatar_url);

        // Username must stay unique across other accounts
        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE user_name = ?1 AND id != ?2",
            rusqlite::params![user_name, user_id],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(ApiError::conflict("username already exists"));
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match &new_password_hash {
            Some(hash) => {
                conn.execute(
                    "UPDATE users SET user_name = ?1, full_name = ?2, gender = ?3,
                            avatar_url = ?4, password_hash = ?5, updated_at = ?6
                     WHERE id = ?7",
                    rusqlite::params![user_name, full_name, gender, avatar_url, hash, now, user_id],
                )?;
            }
            None => {
                conn.execute(
                    "UPDATE users SET user_name = ?1, full_name = ?2, gender = ?3,
                            avatar_url = ?4, updated_at = ?5
                     WHERE id = ?6",
                    rusqlite::params![user_name, full_name, gender, avatar_url, now, user_id],
                )?;
            }
        }

        Ok(UserProfile {
            id: user_id,
            user_name,
            full_name,
            gender,
            avatar_url,
        })
    })
    .await??;

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Relationship of a search result to the caller.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationStatus {
    None,
    Friends,
    Sent,
    Pending,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub user: UserProfile,
    pub status: RelationStatus,
}

/// GET /api/users/search?q= — case-insensitive substring match on
/// username/full name, excluding the caller, annotated with friend status.
pub async fn search_users(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let needle = query.q.unwrap_or_default().trim().to_string();
    if needle.is_empty() {
        return Err(ApiError::validation("search query is required"));
    }

    let db = state.db.clone();
    let user_id = claims.sub;

    let results = tokio::task::spawn_blocking(move || {
        let conn = crate::db::lock(&db)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {},
                    EXISTS(SELECT 1 FROM friendships f
                           WHERE (f.user_a = ?1 AND f.user_b = users.id)
                              OR (f.user_a = users.id AND f.user_b = ?1)),
                    EXISTS(SELECT 1 FROM friend_requests r
                           WHERE r.sender_id = ?1 AND r.receiver_id = users.id),
                    EXISTS(SELECT 1 FROM friend_requests r
                           WHERE r.sender_id = users.id AND r.receiver_id = ?1)
             FROM users
             WHERE id != ?1
               AND (user_name LIKE '%' || ?2 || '%' OR full_name LIKE '%' || ?2 || '%')
             ORDER BY user_name",
            UserProfile::COLUMNS
        ))?;

        let results = stmt
            .query_map(rusqlite::params![user_id, needle], |row| {
                let user = UserProfile::from_row(row)?;
                let is_friend: bool = row.get(5)?;
                let sent: bool = row.get(6)?;
                let pending: bool = row.get(7)?;
                let status = if is_friend {
                    RelationStatus::Friends
                } else if sent {
                    RelationStatus::Sent
                } else if pending {
                    RelationStatus::Pending
                } else {
                    RelationStatus::None
                };
                Ok(SearchResult { user, status })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok::<_, ApiError>(results)
    })
    .await??;

    Ok(Json(results))
}
