use axum::{middleware, Json, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::JwtSecret;
use crate::chat::messages;
use crate::friends::{queries as friend_queries, requests as friend_requests};
use crate::state::AppState;
use crate::users::{accounts, profile};
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on register/login.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5) // Allow burst of 5
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    // Auth routes with rate limiting
    let auth_routes = Router::new()
        .route("/api/users/register", axum::routing::post(accounts::register))
        .route("/api/users/login", axum::routing::post(accounts::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Authenticated routes (JWT required — Claims extractor validates token)
    let user_routes = Router::new()
        .route("/api/users", axum::routing::get(profile::list_other_users))
        .route("/api/users/profile", axum::routing::put(profile::update_profile))
        .route("/api/users/search", axum::routing::get(profile::search_users));

    let friend_routes = Router::new()
        .route("/api/friends", axum::routing::get(friend_queries::list_friends))
        .route("/api/friends/requests", axum::routing::get(friend_queries::list_requests))
        .route(
            "/api/friends/request/{id}",
            axum::routing::post(friend_requests::send_request),
        )
        .route(
            "/api/friends/accept/{id}",
            axum::routing::post(friend_requests::accept_request),
        );

    // Note: /api/messages/latest MUST come before /api/messages/{id} to
    // avoid the literal segment parsing as a user id.
    let message_routes = Router::new()
        .route("/api/messages/latest", axum::routing::get(messages::latest_messages))
        .route("/api/messages/{id}", axum::routing::post(messages::send_message))
        .route("/api/messages/{id}", axum::routing::get(messages::get_messages));

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(friend_routes)
        .merge(message_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
