use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use ember_api::middleware::require_auth;
use ember_api::notify::Notifier;
use ember_api::{AppState, AppStateInner, feed, history, lobby, location, matches, swipes};
use ember_discovery::cache::{DEFAULT_TTL_SECS, FeedCache};
use ember_discovery::embedding::EmbeddingClient;
use ember_gateway::connection;
use ember_gateway::lobby::spawn_lobby;
use ember_gateway::registry::ChatRegistry;
use ember_types::api::Claims;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("EMBER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("EMBER_DB_PATH").unwrap_or_else(|_| "ember.db".into());
    let host = std::env::var("EMBER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("EMBER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let cache_ttl: u64 = std::env::var("EMBER_FEED_CACHE_TTL_SECS")
        .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
        .parse()?;
    let idle_secs: u64 = std::env::var("EMBER_CHAT_IDLE_SECS")
        .unwrap_or_else(|_| "600".into())
        .parse()?;
    let feed_limit: usize = std::env::var("EMBER_FEED_LIMIT")
        .unwrap_or_else(|_| "20".into())
        .parse()?;

    // Embedding collaborator is optional; without it every semantic score is
    // the neutral default.
    let embedding = std::env::var("EMBER_EMBEDDING_URL").ok().map(|url| {
        let api_key = std::env::var("EMBER_EMBEDDING_API_KEY").unwrap_or_default();
        let model = std::env::var("EMBER_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".into());
        EmbeddingClient::new(url, api_key, model)
    });
    let push_url = std::env::var("EMBER_PUSH_URL").ok();

    // Init database
    let db = Arc::new(ember_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = ChatRegistry::new(db.clone(), Duration::from_secs(idle_secs));
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        registry,
        lobby: spawn_lobby(),
        cache: FeedCache::new(Duration::from_secs(cache_ttl)),
        embedding,
        notifier: Notifier::new(push_url),
        feed_limit,
    });

    // Routes
    let protected_routes = Router::new()
        .route("/feed", get(feed::get_feed))
        .route("/like", post(swipes::like))
        .route("/pass", post(swipes::pass))
        .route("/history", get(history::get_history))
        .route("/location", put(location::update_location))
        .route("/matches/{match_id}", delete(matches::delete_match))
        .route("/lobby/join", post(lobby::join))
        .route("/lobby/leave", post(lobby::leave))
        .route("/lobby/status", get(lobby::status))
        .layer(middleware::from_fn(require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/chat", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Ember server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ChatQuery {
    match_id: Uuid,
    /// Browsers cannot set Authorization on WebSocket upgrades, so the token
    /// may come as a query param instead.
    token: Option<String>,
}

/// Authenticate the upgrade, resolve the match and membership, then hand the
/// socket to the per-match actor's connection loop.
async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<ChatQuery>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let token = query.token.clone().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    });
    let token = token.ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?
    .claims;

    let row = {
        let db = state.db.clone();
        let match_id = query.match_id;
        tokio::task::spawn_blocking(move || db.get_match(match_id))
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?
    };
    let row = row.ok_or(StatusCode::NOT_FOUND)?;

    let user = claims.sub.to_string();
    if row.user_a != user && row.user_b != user {
        return Err(StatusCode::FORBIDDEN);
    }

    let channel_id: Uuid = row
        .channel_id
        .parse()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let registry = state.registry.clone();
    let match_id = query.match_id;
    let participant_id = claims.sub;

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, registry, channel_id, match_id, participant_id)
    })
    .into_response())
}
