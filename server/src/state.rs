use crate::db::DbPool;
use crate::store::ConversationStore;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The connection registry is constructed at startup and injected here,
/// never held as a module global.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Document-style store for conversations and messages
    pub store: ConversationStore,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Active WebSocket connection per user (at most one; last-connect-wins)
    pub connections: ConnectionRegistry,
}
