use axum::{Extension, Json, extract::State};
use tracing::debug;

use ember_discovery::cell::{CELL_LEVEL, cell_of};
use ember_types::api::{Claims, LocationUpdateRequest, LocationUpdateResponse};

use crate::AppState;
use crate::error::ApiError;

/// Position ping. The spatial cell is recomputed from the new coordinates and
/// stored with them in one update, so the cell is never stale.
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LocationUpdateRequest>,
) -> Result<Json<LocationUpdateResponse>, ApiError> {
    let cell = cell_of(req.lat, req.lon, CELL_LEVEL)
        .map_err(|e| ApiError::validation("bad_coordinates", e.to_string()))?;

    let updated = {
        let db = state.db.clone();
        let user_id = claims.sub;
        let cell_key = cell.to_string();
        tokio::task::spawn_blocking(move || db.update_position(user_id, req.lat, req.lon, &cell_key))
            .await
            .map_err(|e| anyhow::anyhow!("position update join error: {}", e))??
    };
    if !updated {
        return Err(ApiError::NotFound("user"));
    }

    debug!("{} moved to cell {}", claims.sub, cell);
    Ok(Json(LocationUpdateResponse {
        cell: cell.to_string(),
    }))
}
