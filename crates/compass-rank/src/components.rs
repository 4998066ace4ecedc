//! Normalized scoring components.
//!
//! Each function maps one raw signal onto a comparable scale. Missing inputs
//! yield 0.0 rather than an error.

use chrono::{DateTime, Utc};

use compass_core::types::{DietaryIntent, GeneralIntentSignal};

/// Category substrings treated as food places when a dietary intent is active.
pub const FOOD_CATEGORIES: &[&str] = &[
    "restaurant",
    "cafe",
    "café",
    "bar",
    "bakery",
    "bistro",
    "pizzeria",
    "tapas",
    "food",
    "eatery",
    "ice cream",
];

/// Similarity from the vector search, clamped to [0, 1].
pub fn semantic(similarity: f64) -> f64 {
    if similarity.is_finite() {
        similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Star rating on a five-point scale.
pub fn rating(rating: Option<f64>) -> f64 {
    rating
        .filter(|r| r.is_finite())
        .map(|r| (r / 5.0).clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Inverse decay from 1.0 at the user's position to 0.2 at `max_km`;
/// anything farther, or unknown, scores 0.
pub fn distance(distance_km: Option<f64>, max_km: f64) -> f64 {
    match distance_km {
        Some(d) if max_km > 0.0 && d >= 0.0 && d <= max_km => 1.0 / (1.0 + 4.0 * d / max_km),
        _ => 0.0,
    }
}

/// Half-life decay since the most recent review. Reviews dated in the future
/// count as brand new.
pub fn freshness(
    last_review: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let Some(last) = last_review else {
        return 0.0;
    };
    if half_life_days <= 0.0 {
        return 0.0;
    }
    let age_days = (now - last).num_seconds().max(0) as f64 / 86_400.0;
    (-std::f64::consts::LN_2 * age_days / half_life_days).exp()
}

/// Log-scaled review count, saturating at 1.0 once `saturation` is reached.
pub fn popularity(review_count: Option<u64>, saturation: u64) -> f64 {
    let count = review_count.unwrap_or(0);
    if count == 0 || saturation == 0 {
        return 0.0;
    }
    let scaled = (1.0 + count as f64).ln() / (1.0 + saturation as f64).ln();
    scaled.min(1.0)
}

/// Detection confidence when the POI is tagged with the detected diet.
pub fn dietary(tags: &[String], intent: Option<&DietaryIntent>) -> f64 {
    let Some(intent) = intent else {
        return 0.0;
    };
    let diet = intent.diet.to_lowercase();
    if tags.iter().any(|t| t.to_lowercase() == diet) {
        intent.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// 1.0 when the category is one the user asked for, or a food category while
/// a dietary need is active.
pub fn category_relevance(
    category: Option<&str>,
    preferred: &[String],
    dietary_active: bool,
) -> f64 {
    let Some(category) = category else {
        return 0.0;
    };
    let category = category.to_lowercase();

    if preferred.iter().any(|p| p.to_lowercase() == category) {
        return 1.0;
    }
    if dietary_active && FOOD_CATEGORIES.iter().any(|f| category.contains(f)) {
        return 1.0;
    }
    0.0
}

/// Boost or penalty for the category, in [-1, 1].
pub fn general_intent(category: Option<&str>, signal: Option<&GeneralIntentSignal>) -> f64 {
    let (Some(category), Some(signal)) = (category, signal) else {
        return 0.0;
    };
    signal
        .category_adjustments
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(category))
        .map(|(_, v)| v.clamp(-1.0, 1.0))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 12, 0, 0).unwrap()
    }

    // ---- semantic / rating ----

    #[test]
    fn test_semantic_clamps() {
        assert_eq!(semantic(0.42), 0.42);
        assert_eq!(semantic(1.7), 1.0);
        assert_eq!(semantic(-0.2), 0.0);
        assert_eq!(semantic(f64::NAN), 0.0);
    }

    #[test]
    fn test_rating_scale() {
        assert_eq!(rating(Some(5.0)), 1.0);
        assert!((rating(Some(4.0)) - 0.8).abs() < 1e-9);
        assert_eq!(rating(None), 0.0);
    }

    // ---- distance ----

    #[test]
    fn test_distance_at_origin_is_one() {
        assert_eq!(distance(Some(0.0), 10.0), 1.0);
    }

    #[test]
    fn test_distance_at_max_is_floor() {
        assert!((distance(Some(10.0), 10.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_distance_beyond_max_is_zero() {
        assert_eq!(distance(Some(10.01), 10.0), 0.0);
    }

    #[test]
    fn test_distance_decreases_monotonically() {
        let near = distance(Some(1.0), 10.0);
        let mid = distance(Some(5.0), 10.0);
        let far = distance(Some(9.0), 10.0);
        assert!(near > mid && mid > far);
    }

    #[test]
    fn test_distance_unknown_is_zero() {
        assert_eq!(distance(None, 10.0), 0.0);
        assert_eq!(distance(Some(1.0), 0.0), 0.0);
    }

    // ---- freshness ----

    #[test]
    fn test_freshness_halves_at_half_life() {
        let last = now() - Duration::days(90);
        let score = freshness(Some(last), now(), 90.0);
        assert!((score - 0.5).abs() < 0.01, "got {}", score);
    }

    #[test]
    fn test_freshness_fresh_review_is_one() {
        assert!((freshness(Some(now()), now(), 90.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_freshness_future_review_is_one() {
        let future = now() + Duration::days(3);
        assert!((freshness(Some(future), now(), 90.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_freshness_no_review_is_zero() {
        assert_eq!(freshness(None, now(), 90.0), 0.0);
    }

    // ---- popularity ----

    #[test]
    fn test_popularity_log_scaled() {
        let small = popularity(Some(10), 1000);
        let medium = popularity(Some(100), 1000);
        assert!(small > 0.0 && small < medium && medium < 1.0);
        // Ten times the reviews is far less than ten times the score
        assert!(medium < small * 2.5);
    }

    #[test]
    fn test_popularity_saturates() {
        assert_eq!(popularity(Some(1000), 1000), 1.0);
        assert_eq!(popularity(Some(1_000_000), 1000), 1.0);
    }

    #[test]
    fn test_popularity_missing_is_zero() {
        assert_eq!(popularity(None, 1000), 0.0);
        assert_eq!(popularity(Some(0), 1000), 0.0);
    }

    // ---- dietary / category / general ----

    #[test]
    fn test_dietary_match_scales_by_confidence() {
        let intent = DietaryIntent {
            diet: "Vegan".into(),
            confidence: 0.8,
        };
        let tags = vec!["vegan".to_string(), "gluten-free".to_string()];
        assert!((dietary(&tags, Some(&intent)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_dietary_no_match() {
        let intent = DietaryIntent {
            diet: "halal".into(),
            confidence: 0.9,
        };
        assert_eq!(dietary(&["vegan".to_string()], Some(&intent)), 0.0);
        assert_eq!(dietary(&["vegan".to_string()], None), 0.0);
    }

    #[test]
    fn test_category_relevance_preferred() {
        let preferred = vec!["Beach".to_string()];
        assert_eq!(category_relevance(Some("beach"), &preferred, false), 1.0);
        assert_eq!(category_relevance(Some("museum"), &preferred, false), 0.0);
    }

    #[test]
    fn test_category_relevance_food_under_dietary_intent() {
        assert_eq!(category_relevance(Some("Tapas Bar"), &[], true), 1.0);
        assert_eq!(category_relevance(Some("Tapas Bar"), &[], false), 0.0);
        assert_eq!(category_relevance(None, &[], true), 0.0);
    }

    #[test]
    fn test_general_intent_boost_and_penalty() {
        let mut adjustments = BTreeMap::new();
        adjustments.insert("beach".to_string(), 0.6);
        adjustments.insert("nightclub".to_string(), -3.0);
        let signal = GeneralIntentSignal {
            intent: Some("family_day_out".into()),
            category_adjustments: adjustments,
        };
        assert_eq!(general_intent(Some("Beach"), Some(&signal)), 0.6);
        assert_eq!(general_intent(Some("nightclub"), Some(&signal)), -1.0);
        assert_eq!(general_intent(Some("museum"), Some(&signal)), 0.0);
        assert_eq!(general_intent(Some("beach"), None), 0.0);
    }
}
