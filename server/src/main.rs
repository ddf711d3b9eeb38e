mod auth;
mod chat;
mod config;
mod db;
mod error;
mod friends;
mod routes;
mod state;
mod store;
mod users;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use state::AppState;
use store::ConversationStore;
use ws::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "perch_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "perch_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Perch server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // The connection registry is process-lifetime state: after a restart
    // everyone appears offline until they reconnect.
    let state = AppState {
        store: ConversationStore::new(db.clone()),
        db,
        jwt_secret,
        connections: ConnectionRegistry::new(),
    };

    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    // ConnectInfo is required by the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
