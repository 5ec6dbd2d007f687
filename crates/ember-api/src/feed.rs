use std::collections::HashSet;

use axum::{Extension, Json, extract::Query, extract::State};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use ember_discovery::cell::{CELL_LEVEL, cell_of};
use ember_discovery::score::{
    SEMANTIC_NEUTRAL, blend, reason_for, semantic_score, structured_score,
};
use ember_types::api::{Claims, FeedCandidate, FeedResponse};
use ember_types::models::UserProfile;

use crate::error::ApiError;
use crate::{AppState, AppStateInner};

/// Width of a level-2 cell in km, roughly — used to turn an explicit radius
/// into a neighbor ring count.
const CELL_WIDTH_KM: f64 = 1.1;
const MAX_RING: u32 = 2;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub radius: Option<f64>,
}

/// Assemble the discovery feed: resolve position, search the cell
/// neighborhood through the cache, filter, then score the survivors
/// concurrently.
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let requester = load_profile(&state, claims.sub)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let (lat, lon) = match (query.lat, query.long) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => (requester.lat, requester.lon),
    };

    let cell = cell_of(lat, lon, CELL_LEVEL)
        .map_err(|e| ApiError::validation("bad_coordinates", e.to_string()))?;
    let cells = cell.neighbors(ring_for_radius(query.radius));
    let mode = requester.mode;

    // Gather raw candidates per cell, cache first. A miss falls through to
    // the primary store and repopulates the entry.
    let mut raw: Vec<UserProfile> = Vec::new();
    let mut cache_hit = true;
    for cell in cells {
        if let Some(list) = state.cache.get(&cell, mode).await {
            raw.extend(list);
        } else {
            cache_hit = false;
            let db = state.db.clone();
            let cell_key = cell.to_string();
            let list = tokio::task::spawn_blocking(move || db.profiles_in_cell(&cell_key, mode))
                .await
                .map_err(|e| anyhow::anyhow!("feed query join error: {}", e))??;
            state.cache.put(cell, mode, list.clone()).await;
            raw.extend(list);
        }
    }

    // Swipe-history filtering happens here, after the cache, so a shared
    // cache entry stays correct for every requester.
    let swiped: HashSet<Uuid> = {
        let db = state.db.clone();
        let actor = claims.sub;
        tokio::task::spawn_blocking(move || db.swiped_target_ids(actor))
            .await
            .map_err(|e| anyhow::anyhow!("swipe query join error: {}", e))??
            .into_iter()
            .collect()
    };
    let candidates = filter_candidates(raw, requester.id, &swiped, state.feed_limit);

    // Embed the requester's bio once; each candidate embed happens in the
    // per-candidate fan-out below.
    let requester_embedding = match &state.embedding {
        Some(client) => match client.generate(&requester.bio).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Embedding service degraded, using neutral semantic scores: {}", e);
                None
            }
        },
        None => None,
    };

    let scored = join_all(
        candidates
            .into_iter()
            .map(|candidate| score_candidate(&state, &requester, requester_embedding.as_deref(), candidate)),
    )
    .await;

    Ok(Json(FeedResponse {
        candidates: scored,
        cache_hit,
    }))
}

/// Score one candidate. Never fails — an embedding error degrades this
/// candidate to the structured-only blend.
async fn score_candidate(
    state: &AppStateInner,
    requester: &UserProfile,
    requester_embedding: Option<&[f32]>,
    candidate: UserProfile,
) -> FeedCandidate {
    let structured = {
        let mut rng = rand::rng();
        structured_score(requester, &candidate, &mut rng)
    };

    let semantic = match (&state.embedding, requester_embedding) {
        (Some(client), Some(requester_embedding)) => {
            match client.generate(&candidate.bio).await {
                Ok(embedding) => semantic_score(requester_embedding, &embedding),
                Err(e) => {
                    warn!("Embedding failed for candidate {}: {}", candidate.id, e);
                    SEMANTIC_NEUTRAL
                }
            }
        }
        _ => SEMANTIC_NEUTRAL,
    };

    FeedCandidate {
        user_id: candidate.id,
        display_name: candidate.display_name,
        age: candidate.age,
        bio: candidate.bio,
        score: blend(structured, semantic),
        reason: reason_for(semantic).to_string(),
    }
}

fn ring_for_radius(radius_km: Option<f64>) -> u32 {
    match radius_km {
        Some(radius) if radius.is_finite() && radius > 0.0 => {
            ((radius / CELL_WIDTH_KM).ceil() as u32).clamp(1, MAX_RING)
        }
        _ => 1,
    }
}

fn filter_candidates(
    raw: Vec<UserProfile>,
    requester: Uuid,
    swiped: &HashSet<Uuid>,
    limit: usize,
) -> Vec<UserProfile> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|p| p.id != requester && !swiped.contains(&p.id) && seen.insert(p.id))
        .take(limit)
        .collect()
}

async fn load_profile(state: &AppStateInner, id: Uuid) -> Result<Option<UserProfile>, ApiError> {
    let db = state.db.clone();
    let profile = tokio::task::spawn_blocking(move || db.get_profile(id))
        .await
        .map_err(|e| anyhow::anyhow!("profile query join error: {}", e))??;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::models::Mode;

    fn profile(id: Uuid) -> UserProfile {
        UserProfile {
            id,
            display_name: "p".into(),
            age: 30,
            mode: Mode::Romantic,
            goals: vec![],
            interests: vec![],
            drinks: false,
            smokes: false,
            bio: String::new(),
            lat: 40.0,
            lon: -73.9,
            cell: "c2:4000:-7390".into(),
        }
    }

    #[test]
    fn ring_defaults_and_clamps() {
        assert_eq!(ring_for_radius(None), 1);
        assert_eq!(ring_for_radius(Some(0.5)), 1);
        assert_eq!(ring_for_radius(Some(2.0)), 2);
        assert_eq!(ring_for_radius(Some(50.0)), MAX_RING);
        assert_eq!(ring_for_radius(Some(-3.0)), 1);
        assert_eq!(ring_for_radius(Some(f64::NAN)), 1);
    }

    #[test]
    fn filter_excludes_self_swiped_and_duplicates() {
        let me = Uuid::new_v4();
        let swiped_id = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        let raw = vec![
            profile(me),
            profile(swiped_id),
            profile(fresh),
            profile(fresh), // duplicate from an overlapping cell list
        ];
        let swiped: HashSet<Uuid> = [swiped_id].into_iter().collect();

        let out = filter_candidates(raw, me, &swiped, 20);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, fresh);
    }

    #[test]
    fn filter_truncates_to_limit() {
        let me = Uuid::new_v4();
        let raw: Vec<UserProfile> = (0..30).map(|_| profile(Uuid::new_v4())).collect();
        let out = filter_candidates(raw, me, &HashSet::new(), 20);
        assert_eq!(out.len(), 20);
    }
}
