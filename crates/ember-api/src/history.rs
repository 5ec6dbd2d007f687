use axum::{Extension, Json, extract::Query, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use ember_db::models::MatchRow;
use ember_types::api::Claims;
use ember_types::models::ChatMessage;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub match_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Recent messages for a match's channel, oldest first. Served through the
/// chat registry so it works with zero live sessions — a retired actor is
/// recreated cold just to answer the read.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let row = load_match(&state, query.match_id)
        .await?
        .ok_or(ApiError::NotFound("match"))?;
    ensure_participant(&row, claims.sub)?;

    let channel_id: Uuid = row
        .channel_id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt channel id '{}': {}", row.channel_id, e))?;

    let messages = state
        .registry
        .history(channel_id, query.match_id, query.limit.min(200))
        .await?;

    Ok(Json(messages))
}

pub(crate) async fn load_match(
    state: &crate::AppStateInner,
    match_id: Uuid,
) -> Result<Option<MatchRow>, ApiError> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_match(match_id))
        .await
        .map_err(|e| anyhow::anyhow!("match query join error: {}", e))??;
    Ok(row)
}

pub(crate) fn ensure_participant(row: &MatchRow, user: Uuid) -> Result<(), ApiError> {
    let user = user.to_string();
    if row.user_a == user || row.user_b == user {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
