use axum::{Extension, Json, extract::Query, extract::State};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use ember_db::queries::SwipeOutcome;
use ember_types::api::{Claims, MatchPayload, SwipeResponse};
use ember_types::models::Decision;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SwipeQuery {
    pub id: Uuid,
}

pub async fn like(
    state: State<AppState>,
    claims: Extension<Claims>,
    query: Query<SwipeQuery>,
) -> Result<Json<SwipeResponse>, ApiError> {
    swipe(state, claims, query, Decision::Like).await
}

pub async fn pass(
    state: State<AppState>,
    claims: Extension<Claims>,
    query: Query<SwipeQuery>,
) -> Result<Json<SwipeResponse>, ApiError> {
    swipe(state, claims, query, Decision::Pass).await
}

/// Record the decision and, on reciprocity, hand back the match plus its
/// chat channel. Match creation happens inside the same store transaction as
/// the swipe write — there is never a match without a channel.
async fn swipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SwipeQuery>,
    decision: Decision,
) -> Result<Json<SwipeResponse>, ApiError> {
    let actor = claims.sub;
    let target = query.id;

    if actor == target {
        return Err(ApiError::validation(
            "self_swipe",
            "cannot swipe on yourself",
        ));
    }

    // Validate the target exists before writing anything.
    let target_profile = {
        let db = state.db.clone();
        tokio::task::spawn_blocking(move || db.get_profile(target))
            .await
            .map_err(|e| anyhow::anyhow!("profile query join error: {}", e))??
    };
    if target_profile.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let outcome = {
        let db = state.db.clone();
        tokio::task::spawn_blocking(move || db.record_swipe(actor, target, decision))
            .await
            .map_err(|e| anyhow::anyhow!("swipe join error: {}", e))??
    };

    let matched = match outcome {
        SwipeOutcome::Recorded => None,
        SwipeOutcome::Matched { row, newly_created } => {
            let match_id: Uuid = row
                .id
                .parse()
                .map_err(|e| anyhow::anyhow!("corrupt match id '{}': {}", row.id, e))?;
            let chat_channel_id: Uuid = row
                .channel_id
                .parse()
                .map_err(|e| anyhow::anyhow!("corrupt channel id '{}': {}", row.channel_id, e))?;

            if newly_created {
                info!("Match {} created for {} and {}", match_id, actor, target);
                state.notifier.notify_match([actor, target], match_id);
            }

            Some(MatchPayload {
                match_id,
                chat_channel_id,
            })
        }
    };

    Ok(Json(SwipeResponse {
        decision: decision.as_str().to_string(),
        matched,
    }))
}
