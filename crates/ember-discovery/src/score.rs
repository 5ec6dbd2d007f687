use std::collections::HashSet;

use ember_types::models::UserProfile;
use rand::Rng;

/// Points for any overlap in declared relationship goals.
const GOAL_POINTS: u32 = 40;
/// Partial credit when both declared goals but none overlap.
const GOAL_PARTIAL_POINTS: u32 = 15;
/// Cap for interest-tag overlap.
const INTEREST_POINTS: u32 = 30;
/// Per-flag credit for lifestyle parity (drinking, smoking).
const LIFESTYLE_POINTS: u32 = 10;
const BASE_POINTS: u32 = 5;

/// The structured subtotal is clamped into this band before perturbation, so
/// the final structured score always lands in [65, 100].
const SCORE_FLOOR: u32 = 65;
const SCORE_CEIL: u32 = 95;
const PERTURB_MAX: u32 = 5;

/// Substituted when the embedding service is unavailable — ranking never
/// blocks on the external outage.
pub const SEMANTIC_NEUTRAL: u32 = 70;

/// Semantic scores at or above this read as a personality-level match rather
/// than plain tag overlap.
pub const SEMANTIC_DEEP_THRESHOLD: u32 = 75;

pub const REASON_DEEP: &str = "deep personality match";
pub const REASON_SHARED: &str = "shared interests";

/// Structured compatibility score in [65, 100].
///
/// The 0-5 perturbation is intentional product behavior ("organic" variance
/// between otherwise-identical pairs), not noise to eliminate.
pub fn structured_score<R: Rng + ?Sized>(a: &UserProfile, b: &UserProfile, rng: &mut R) -> u32 {
    let subtotal = BASE_POINTS
        + goal_points(&a.goals, &b.goals)
        + interest_points(&a.interests, &b.interests)
        + lifestyle_points(a, b);

    subtotal.clamp(SCORE_FLOOR, SCORE_CEIL) + rng.random_range(0..=PERTURB_MAX)
}

fn goal_points(a: &[String], b: &[String]) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let set: HashSet<&str> = a.iter().map(String::as_str).collect();
    if b.iter().any(|g| set.contains(g.as_str())) {
        GOAL_POINTS
    } else {
        // Both know what they want, just not the same thing.
        GOAL_PARTIAL_POINTS
    }
}

fn interest_points(a: &[String], b: &[String]) -> u32 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let larger = set_a.len().max(set_b.len());
    if larger == 0 {
        return 0;
    }

    let shared = set_a.intersection(&set_b).count();
    // Aggressive scaling: a third of the tags in common already earns half
    // the cap; full overlap is not required to max out.
    let ratio = (shared as f64 / larger as f64 * 1.5).min(1.0);
    (ratio * INTEREST_POINTS as f64).round() as u32
}

fn lifestyle_points(a: &UserProfile, b: &UserProfile) -> u32 {
    let mut points = 0;
    if a.drinks == b.drinks {
        points += LIFESTYLE_POINTS;
    }
    if a.smokes == b.smokes {
        points += LIFESTYLE_POINTS;
    }
    points
}

/// Cosine similarity of two embedding vectors, scaled to [0, 100].
pub fn semantic_score(a: &[f32], b: &[f32]) -> u32 {
    (cosine_similarity(a, b).max(0.0) * 100.0).round() as u32
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Displayed score: 70% structured, 30% semantic, clamped to [0, 100].
pub fn blend(structured: u32, semantic: u32) -> u32 {
    (structured as f64 * 0.7 + semantic as f64 * 0.3)
        .round()
        .clamp(0.0, 100.0) as u32
}

pub fn reason_for(semantic: u32) -> &'static str {
    if semantic >= SEMANTIC_DEEP_THRESHOLD {
        REASON_DEEP
    } else {
        REASON_SHARED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::models::Mode;
    use uuid::Uuid;

    fn profile(goals: &[&str], interests: &[&str], drinks: bool, smokes: bool) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            display_name: "t".into(),
            age: 30,
            mode: Mode::Romantic,
            goals: goals.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            drinks,
            smokes,
            bio: String::new(),
            lat: 0.0,
            lon: 0.0,
            cell: "c2:0:0".into(),
        }
    }

    #[test]
    fn score_bounds_with_nothing_shared() {
        let a = profile(&[], &["a", "b"], true, false);
        let b = profile(&[], &["c", "d"], false, true);
        let mut rng = rand::rng();
        for _ in 0..50 {
            let score = structured_score(&a, &b, &mut rng);
            assert!((65..=100).contains(&score), "score {} out of bounds", score);
            // Base + random only reaches the low band.
            assert!(score <= 70);
        }
    }

    #[test]
    fn score_never_exceeds_100() {
        let a = profile(&["long_term"], &["x", "y", "z"], true, true);
        let b = profile(&["long_term"], &["x", "y", "z"], true, true);
        let mut rng = rand::rng();
        for _ in 0..50 {
            assert!(structured_score(&a, &b, &mut rng) <= 100);
        }
    }

    #[test]
    fn shared_goals_outrank_disjoint_goals() {
        let base = profile(&["long_term"], &[], true, false);
        let shared = profile(&["long_term", "casual"], &[], true, false);
        let disjoint = profile(&["casual"], &[], true, false);

        assert_eq!(goal_points(&base.goals, &shared.goals), GOAL_POINTS);
        assert_eq!(goal_points(&base.goals, &disjoint.goals), GOAL_PARTIAL_POINTS);
        assert_eq!(goal_points(&base.goals, &[]), 0);
    }

    #[test]
    fn interest_overlap_scales_aggressively() {
        let a: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let b: Vec<String> = vec!["a".into(), "x".into(), "y".into()];
        // 1/3 shared, ×1.5 → 0.5 → 15 points.
        assert_eq!(interest_points(&a, &b), 15);

        // 2/3 shared saturates the cap.
        let c: Vec<String> = vec!["a".into(), "b".into(), "z".into()];
        assert_eq!(interest_points(&a, &c), 30);

        assert_eq!(interest_points(&a, &[]), 0);
        assert_eq!(interest_points(&[], &[]), 0);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn semantic_score_clamps_negative() {
        assert_eq!(semantic_score(&[1.0, 0.0], &[-1.0, 0.0]), 0);
        assert_eq!(semantic_score(&[1.0, 0.0], &[1.0, 0.0]), 100);
    }

    #[test]
    fn blend_weights_and_clamps() {
        assert_eq!(blend(100, 100), 100);
        assert_eq!(blend(80, 70), 77);
        assert_eq!(blend(0, 0), 0);
    }

    #[test]
    fn reason_thresholds() {
        assert_eq!(reason_for(SEMANTIC_DEEP_THRESHOLD), REASON_DEEP);
        assert_eq!(reason_for(SEMANTIC_NEUTRAL), REASON_SHARED);
        assert_eq!(reason_for(100), REASON_DEEP);
    }
}
