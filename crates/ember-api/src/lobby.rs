use axum::{Extension, Json, extract::State};

use ember_types::api::{
    Claims, LobbyJoinRequest, LobbyJoinResponse, LobbyLeaveResponse, LobbyStatusResponse,
};

use crate::AppState;
use crate::error::ApiError;

pub async fn join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LobbyJoinRequest>,
) -> Result<Json<LobbyJoinResponse>, ApiError> {
    let position = state.lobby.join(claims.sub, req.preferences).await;
    Ok(Json(LobbyJoinResponse { position }))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LobbyLeaveResponse>, ApiError> {
    let left = state.lobby.leave(claims.sub).await;
    Ok(Json(LobbyLeaveResponse { left }))
}

pub async fn status(
    State(state): State<AppState>,
) -> Result<Json<LobbyStatusResponse>, ApiError> {
    let waiting = state.lobby.status().await;
    Ok(Json(LobbyStatusResponse { waiting }))
}
