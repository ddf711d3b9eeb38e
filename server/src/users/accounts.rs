//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{jwt, password};
use crate::db::models::UserProfile;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub user_name: String,
    pub password: String,
    pub confirm_password: String,
    pub gender: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Deterministic default avatar from an external avatar service
/// (placeholder images keyed by username; no media is stored here).
fn default_avatar_url(user_name: &str, gender: &str) -> String {
    match gender {
        "male" => format!("https://avatar.iran.liara.run/public/boy?username={user_name}"),
        "female" => format!("https://avatar.iran.liara.run/public/girl?username={user_name}"),
        _ => format!("https://avatar.iran.liara.run/public?username={user_name}"),
    }
}

/// POST /api/users/register
/// Creates an account and returns a token so the client can connect
/// immediately.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let full_name = body.full_name.trim().to_string();
    let user_name = body.user_name.trim().to_string();
    let gender = body.gender.trim().to_lowercase();

    if full_name.is_empty() || user_name.is_empty() || body.password.is_empty() || gender.is_empty()
    {
        return Err(ApiError::validation("all fields are required"));
    }
    if body.password != body.confirm_password {
        return Err(ApiError::validation("passwords do not match"));
    }

    let password_hash = password::hash_password(&body.password)?;
    let avatar_url = default_avatar_url(&user_name, &gender);

    let user = {
        let db = state.db.clone();
        let user_name = user_name.clone();

        tokio::task::spawn_blocking(move || {
            let conn = crate::db::lock(&db)?;

            let taken: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE user_name = ?1",
                rusqlite::params![user_name],
                |row| row.get(0),
            )?;
            if taken > 0 {
                return Err(ApiError::conflict("username already exists"));
            }

            let id = Uuid::now_v7().to_string();
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            conn.execute(
                "INSERT INTO users (id, user_name, full_name, password_hash, gender, avatar_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![id, user_name, full_name, password_hash, gender, avatar_url, now],
            )?;

            Ok(UserProfile {
                id,
                user_name,
                full_name,
                gender,
                avatar_url,
            })
        })
        .await??
    };

    let token = jwt::issue_access_token(&state.jwt_secret, &user.id, &user.user_name)
        .map_err(|err| ApiError::internal(format!("token issuance failed: {err}")))?;

    tracing::info!(user_id = %user.id, user_name = %user.user_name, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if body.user_name.is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("all fields are required"));
    }

    let (user, password_hash) = {
        let db = state.db.clone();
        let user_name = body.user_name.clone();

        tokio::task::spawn_blocking(move || {
            let conn = crate::db::lock(&db)?;
            let result = conn.query_row(
                &format!(
                    "SELECT {}, password_hash FROM users WHERE user_name = ?1",
                    UserProfile::COLUMNS
                ),
                rusqlite::params![user_name],
                |row| {
                    let profile = UserProfile::from_row(row)?;
                    let hash: String = row.get(5)?;
                    Ok((profile, hash))
                },
            );

            match result {
                Ok(pair) => Ok(pair),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(ApiError::Unauthorized(
                    "incorrect username or password".to_string(),
                )),
                Err(err) => Err(err.into()),
            }
        })
        .await??
    };

    // Argon2 verification is CPU-bound; keep it off the async threads
    let password_ok = {
        let candidate = body.password.clone();
        tokio::task::spawn_blocking(move || password::verify_password(&candidate, &password_hash))
            .await?
    };
    if !password_ok {
        return Err(ApiError::Unauthorized(
            "incorrect username or password".to_string(),
        ));
    }

    let token = jwt::issue_access_token(&state.jwt_secret, &user.id, &user.user_name)
        .map_err(|err| ApiError::internal(format!("token issuance failed: {err}")))?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse { token, user }))
}
