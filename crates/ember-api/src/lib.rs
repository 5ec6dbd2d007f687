pub mod error;
pub mod feed;
pub mod history;
pub mod lobby;
pub mod location;
pub mod matches;
pub mod middleware;
pub mod notify;
pub mod swipes;

use std::sync::Arc;

use ember_db::Database;
use ember_discovery::cache::FeedCache;
use ember_discovery::embedding::EmbeddingClient;
use ember_gateway::lobby::LobbyHandle;
use ember_gateway::registry::ChatRegistry;

use crate::notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub registry: ChatRegistry,
    pub lobby: LobbyHandle,
    pub cache: FeedCache,
    /// None when no embedding endpoint is configured; every semantic score
    /// then falls back to the neutral default.
    pub embedding: Option<EmbeddingClient>,
    pub notifier: Notifier,
    /// Maximum candidates per feed response.
    pub feed_limit: usize,
}
