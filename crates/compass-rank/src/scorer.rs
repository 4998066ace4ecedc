//! Weighted multi-factor candidate ranking.
//!
//! `total = Σ weight_i × component_i` over the eight components in
//! [`crate::components`]. Disabled components contribute 0 and their weight is
//! not redistributed. Ranking is deterministic: descending total, then
//! rating, then review count; remaining ties keep input order.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use compass_core::config::ScoringConfig;
use compass_core::hours::{OpeningHours, UnknownHours};
use compass_core::types::{
    PoiReference, RawCandidate, ScoreBreakdown, ScoreMetadata, SmartScore, UserContext,
};

use crate::components;

/// A candidate annotated with its score for the current query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: RawCandidate,
    pub score: SmartScore,
}

impl ScoredCandidate {
    pub fn to_reference(&self) -> PoiReference {
        self.candidate.to_reference()
    }
}

/// Ranks raw candidates for one user context.
pub struct CandidateScorer {
    config: ScoringConfig,
    hours: Arc<dyn OpeningHours>,
}

impl CandidateScorer {
    pub fn new(config: ScoringConfig, hours: Arc<dyn OpeningHours>) -> Self {
        Self { config, hours }
    }

    /// Scorer whose `is_open` metadata is always false.
    pub fn without_hours(config: ScoringConfig) -> Self {
        Self::new(config, Arc::new(UnknownHours))
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a single candidate.
    ///
    /// Returns `None` only when the candidate lies beyond the user's maximum
    /// distance and exclusion is configured.
    pub fn score(&self, candidate: &RawCandidate, user: &UserContext) -> Option<SmartScore> {
        let cfg = &self.config;
        let flags = &cfg.flags;
        let weights = &cfg.weights;
        let now = user.current_time;

        let max_km = user
            .preferences
            .max_distance_km
            .unwrap_or(cfg.max_distance_km);
        let distance_km = match (user.current_location, candidate.coordinates) {
            (Some(from), Some(to)) => Some(from.distance_km(&to)),
            _ => None,
        };

        if flags.distance && cfg.exclude_beyond_max_distance {
            if let Some(d) = distance_km {
                if d > max_km {
                    debug!(poi_id = %candidate.id, distance_km = d, "Excluded beyond max distance");
                    return None;
                }
            }
        }

        let category = candidate.category.as_deref();
        let breakdown = ScoreBreakdown {
            semantic: gate(flags.semantic, || components::semantic(candidate.similarity)),
            rating: gate(flags.rating, || components::rating(candidate.rating)),
            distance: gate(flags.distance, || components::distance(distance_km, max_km)),
            freshness: gate(flags.freshness, || {
                components::freshness(candidate.last_review_at, now, cfg.freshness_half_life_days)
            }),
            popularity: gate(flags.popularity, || {
                components::popularity(candidate.review_count, cfg.popularity_saturation)
            }),
            dietary_intent: gate(flags.dietary_intent, || {
                components::dietary(&candidate.dietary_tags, user.dietary_intent.as_ref())
            }),
            category_relevance: gate(flags.category_relevance, || {
                components::category_relevance(
                    category,
                    &user.preferences.categories,
                    user.dietary_intent.is_some(),
                )
            }),
            general_intent: gate(flags.general_intent, || {
                components::general_intent(category, user.general_intent.as_ref())
            }),
        };

        let total_score = weights.semantic_similarity * breakdown.semantic
            + weights.user_rating * breakdown.rating
            + weights.distance * breakdown.distance
            + weights.freshness * breakdown.freshness
            + weights.popularity * breakdown.popularity
            + weights.dietary_intent * breakdown.dietary_intent
            + weights.category_relevance * breakdown.category_relevance
            + weights.general_intent * breakdown.general_intent;

        let is_open = self
            .hours
            .is_currently_open(&candidate.to_reference(), now);

        Some(SmartScore {
            total_score,
            breakdown,
            metadata: ScoreMetadata {
                is_open,
                distance_km,
                last_review_date: candidate.last_review_at,
            },
        })
    }

    /// Score every candidate and order them best first.
    pub fn rank(&self, candidates: Vec<RawCandidate>, user: &UserContext) -> Vec<ScoredCandidate> {
        let total = candidates.len();
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter_map(|candidate| {
                self.score(&candidate, user)
                    .map(|score| ScoredCandidate { candidate, score })
            })
            .collect();

        scored.sort_by(compare_ranked);

        debug!(
            candidates = total,
            ranked = scored.len(),
            top_score = scored.first().map(|s| s.score.total_score),
            "Ranked candidates"
        );
        scored
    }
}

fn gate(enabled: bool, component: impl FnOnce() -> f64) -> f64 {
    if enabled {
        component()
    } else {
        0.0
    }
}

fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_score
        .total_cmp(&a.score.total_score)
        .then_with(|| {
            let ra = a.candidate.rating.unwrap_or(0.0);
            let rb = b.candidate.rating.unwrap_or(0.0);
            rb.total_cmp(&ra)
        })
        .then_with(|| {
            b.candidate
                .review_count
                .unwrap_or(0)
                .cmp(&a.candidate.review_count.unwrap_or(0))
        })
}
