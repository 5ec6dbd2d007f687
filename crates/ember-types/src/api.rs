use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between ember-api (REST middleware) and ember-gateway
/// (WebSocket upgrade authentication). Identity issuance happens in the auth
/// collaborator; the core only validates and reads the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Feed --

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedCandidate {
    pub user_id: Uuid,
    pub display_name: String,
    pub age: u8,
    pub bio: String,
    pub score: u32,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub candidates: Vec<FeedCandidate>,
    pub cache_hit: bool,
}

// -- Swipes / matches --

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchPayload {
    pub match_id: Uuid,
    pub chat_channel_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwipeResponse {
    pub decision: String,
    #[serde(rename = "match")]
    pub matched: Option<MatchPayload>,
}

// -- Location --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct LocationUpdateResponse {
    pub cell: String,
}

// -- Lobby --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LobbyJoinRequest {
    #[serde(default)]
    pub preferences: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct LobbyJoinResponse {
    pub position: usize,
}

#[derive(Debug, Serialize)]
pub struct LobbyLeaveResponse {
    pub left: bool,
}

#[derive(Debug, Serialize)]
pub struct LobbyStatusResponse {
    pub waiting: usize,
}
