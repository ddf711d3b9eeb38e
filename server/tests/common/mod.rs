//! Shared helpers for integration tests: spin up a real server on an
//! ephemeral port with a throwaway data directory.

use std::net::SocketAddr;

use serde_json::json;
use tokio::net::TcpListener;

use perch_server::routes::build_router;
use perch_server::state::AppState;
use perch_server::store::ConversationStore;
use perch_server::ws::registry::ConnectionRegistry;

/// Start the server on a random port and return (base_url, addr).
pub async fn start_test_server() -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = perch_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = perch_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState {
        store: ConversationStore::new(db.clone()),
        db,
        jwt_secret,
        connections: ConnectionRegistry::new(),
    };

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    let base_url = format!("http://{}", addr);
    (base_url, addr)
}

/// Register a user and return (access_token, user_id).
pub async fn register_user(base_url: &str, user_name: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/users/register", base_url))
        .json(&json!({
            "fullName": format!("{} Test", user_name),
            "userName": user_name,
            "password": "hunter2hunter2",
            "confirmPassword": "hunter2hunter2",
            "gender": "other",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201, "Registration failed for {}", user_name);
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    (token, user_id)
}
