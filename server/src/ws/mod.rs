pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific
/// client; the channel is the single ordered output path per connection.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
