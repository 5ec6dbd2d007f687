use axum::{Extension, extract::Path, extract::State, http::StatusCode};
use tracing::info;
use uuid::Uuid;

use ember_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;
use crate::history::{ensure_participant, load_match};

/// Unmatch. Cascades to both swipe rows and all chat state for the channel —
/// the only path that retroactively removes state.
pub async fn delete_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let row = load_match(&state, match_id)
        .await?
        .ok_or(ApiError::NotFound("match"))?;
    ensure_participant(&row, claims.sub)?;

    let deleted = {
        let db = state.db.clone();
        tokio::task::spawn_blocking(move || db.delete_match(match_id))
            .await
            .map_err(|e| anyhow::anyhow!("unmatch join error: {}", e))??
    };
    if !deleted {
        // Raced with another unmatch — the end state is what was asked for.
        return Ok(StatusCode::NO_CONTENT);
    }

    info!("Match {} removed by {}", match_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
