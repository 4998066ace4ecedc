use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// How a query relates to the results already shown in the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// A brand-new search that needs a fresh ranked result set.
    #[default]
    General,
    /// A follow-up pinned to one previously shown POI.
    Specific,
    /// A follow-up about the previous result set as a whole.
    Contextual,
}

/// Which classification rule produced a [`QueryDetection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRule {
    /// The semantic follow-up analyzer reported a follow-up.
    SemanticAnalysis,
    /// Ordinal word such as "first" or "last".
    Positional,
    /// A previous POI title appears in the query.
    DirectMention,
    /// A descriptive keyword mapped to a previous POI.
    KeywordSemantic,
    /// Follow-up phrasing without a resolvable target.
    FollowUpLanguage,
    /// Nothing matched; treat as a fresh search.
    General,
}

// =============================================================================
// Geography
// =============================================================================

const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

// =============================================================================
// POI projections
// =============================================================================

/// Display and follow-up metadata carried with a [`PoiReference`].
///
/// `raw_metadata` is captured once from the candidate source and passed
/// through untouched so that later turns can answer from it without a new
/// lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoiMetadata {
    #[serde(default)]
    pub opening_hours: Option<serde_json::Value>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Human-readable address or area.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub raw_metadata: serde_json::Value,
}

/// Lightweight, turn-to-turn preserved projection of a point of interest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoiReference {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: PoiMetadata,
}

impl PoiReference {
    /// Create a reference with empty metadata.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: None,
            metadata: PoiMetadata::default(),
        }
    }

    pub fn rating(&self) -> Option<f64> {
        self.metadata.rating
    }
}

/// A candidate POI as delivered by the vector-search collaborator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Semantic similarity to the query (0.0 to 1.0).
    pub similarity: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Review or visit count used for popularity.
    #[serde(default)]
    pub review_count: Option<u64>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub opening_hours: Option<serde_json::Value>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub raw_metadata: serde_json::Value,
}

impl RawCandidate {
    /// Project the candidate into the reference kept in session context.
    pub fn to_reference(&self) -> PoiReference {
        PoiReference {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            metadata: PoiMetadata {
                opening_hours: self.opening_hours.clone(),
                phone: self.phone.clone(),
                website: self.website.clone(),
                rating: self.rating,
                location: self.location.clone(),
                coordinates: self.coordinates,
                amenities: self.amenities.clone(),
                raw_metadata: self.raw_metadata.clone(),
            },
        }
    }
}

// =============================================================================
// Session context
// =============================================================================

/// One completed query/response cycle. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub search_type: SearchType,
    pub result_count: usize,
    pub results: Vec<PoiReference>,
}

/// Summary of the most recent turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentContext {
    pub last_query: Option<String>,
    pub last_results: Vec<PoiReference>,
    pub search_type: Option<SearchType>,
}

/// Per-session conversational state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
    /// Recency-bounded, oldest first.
    pub conversation_history: Vec<ConversationEntry>,
    pub current_context: CurrentContext,
    /// Every POI id shown in this session. Only grows.
    pub displayed_pois: BTreeSet<String>,
    /// POI ids shown in the most recent turn only.
    pub last_displayed_pois: Vec<String>,
    pub conversation_turn: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: String, user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id,
            conversation_history: Vec::new(),
            current_context: CurrentContext::default(),
            displayed_pois: BTreeSet::new(),
            last_displayed_pois: Vec::new(),
            conversation_turn: 0,
            created_at: now,
            last_accessed: now,
        }
    }

    /// Results shown in the previous turn, in display order.
    pub fn previous_results(&self) -> &[PoiReference] {
        &self.current_context.last_results
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            displayed_pois: self.displayed_pois.iter().cloned().collect(),
            last_displayed_pois: self.last_displayed_pois.clone(),
            conversation_turn: self.conversation_turn,
        }
    }
}

/// Session state relayed back to the caller after each turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub displayed_pois: Vec<String>,
    pub last_displayed_pois: Vec<String>,
    pub conversation_turn: u64,
}

// =============================================================================
// Collaborator payloads
// =============================================================================

/// Relevance flags reported by the intent-recognition collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentContext {
    #[serde(default)]
    pub opening_hours_related: bool,
    #[serde(default)]
    pub contact_related: bool,
    #[serde(default)]
    pub time_related: bool,
    #[serde(default)]
    pub comparison_related: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentRecognitionResult {
    pub primary_intent: String,
    #[serde(default)]
    pub secondary_intents: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub intent_context: IntentContext,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticFollowUpAnalysis {
    pub is_follow_up: bool,
    pub confidence: f64,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Positional word or POI name the analyzer believes is referenced.
    #[serde(default)]
    pub target_poi: Option<String>,
}

/// Outcome of query classification. Never persisted directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryDetection {
    pub search_type: SearchType,
    pub target_poi: Option<PoiReference>,
    pub is_specific: bool,
    pub confidence: f64,
    pub intent_recognition: Option<IntentRecognitionResult>,
    pub rule: DetectionRule,
}

// =============================================================================
// Scoring
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub rating: f64,
    pub distance: f64,
    pub freshness: f64,
    pub popularity: f64,
    pub dietary_intent: f64,
    pub category_relevance: f64,
    pub general_intent: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub is_open: bool,
    pub distance_km: Option<f64>,
    pub last_review_date: Option<DateTime<Utc>>,
}

/// Weighted multi-factor relevance score for one candidate in one query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartScore {
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    pub metadata: ScoreMetadata,
}

/// Dietary need detected upstream, e.g. "vegan" with confidence 0.8.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DietaryIntent {
    pub diet: String,
    pub confidence: f64,
}

/// Category-keyed boosts (positive) or penalties (negative) from the
/// general-intent classifier, each in [-1, 1].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralIntentSignal {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub category_adjustments: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Overrides the configured maximum distance when set.
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Per-request user state fed to the scorer and composer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub current_location: Option<Coordinates>,
    pub current_time: DateTime<Utc>,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub dietary_intent: Option<DietaryIntent>,
    #[serde(default)]
    pub general_intent: Option<GeneralIntentSignal>,
}

impl UserContext {
    /// Context with only a clock reading.
    pub fn at(current_time: DateTime<Utc>) -> Self {
        Self {
            current_location: None,
            current_time,
            preferences: UserPreferences::default(),
            dietary_intent: None,
            general_intent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_search_type_serde_snake_case() {
        let json = serde_json::to_string(&SearchType::Contextual).unwrap();
        assert_eq!(json, "\"contextual\"");
        let parsed: SearchType = serde_json::from_str("\"specific\"").unwrap();
        assert_eq!(parsed, SearchType::Specific);
    }

    #[test]
    fn test_distance_zero_for_same_point() {
        let c = Coordinates::new(38.6447, 0.0445);
        assert!(c.distance_km(&c).abs() < 1e-9);
    }

    #[test]
    fn test_distance_known_pair() {
        // Calpe to Benidorm, roughly 16 km as the crow flies.
        let calpe = Coordinates::new(38.6447, 0.0445);
        let benidorm = Coordinates::new(38.5411, -0.1225);
        let d = calpe.distance_km(&benidorm);
        assert!(d > 15.0 && d < 19.0, "got {}", d);
    }

    #[test]
    fn test_to_reference_copies_metadata() {
        let candidate = RawCandidate {
            id: "poi-1".into(),
            title: "Casa Pepe".into(),
            category: Some("restaurant".into()),
            similarity: 0.8,
            rating: Some(4.6),
            phone: Some("+34 965 83 00 00".into()),
            raw_metadata: json!({"source": "google", "hours": {"monday": []}}),
            ..Default::default()
        };
        let reference = candidate.to_reference();
        assert_eq!(reference.id, "poi-1");
        assert_eq!(reference.rating(), Some(4.6));
        assert_eq!(reference.metadata.phone.as_deref(), Some("+34 965 83 00 00"));
        assert_eq!(reference.metadata.raw_metadata, candidate.raw_metadata);
    }

    #[test]
    fn test_poi_reference_raw_metadata_survives_serde() {
        let raw = json!({
            "opening_hours": {"monday": [{"open": "09:00", "close": "23:00"}]},
            "nested": {"list": [1, 2.5, null, "x"]},
        });
        let mut poi = PoiReference::new("poi-1", "Casa Pepe");
        poi.metadata.raw_metadata = raw.clone();

        let encoded = serde_json::to_string(&poi).unwrap();
        let decoded: PoiReference = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.metadata.raw_metadata, raw);
    }

    #[test]
    fn test_new_session_context_is_empty() {
        let ctx = SessionContext::new("s1".into(), "u1".into(), now());
        assert_eq!(ctx.conversation_turn, 0);
        assert!(ctx.previous_results().is_empty());
        assert!(ctx.displayed_pois.is_empty());
        assert_eq!(ctx.created_at, ctx.last_accessed);
    }

    #[test]
    fn test_summary_reflects_context() {
        let mut ctx = SessionContext::new("s1".into(), "u1".into(), now());
        ctx.displayed_pois.insert("b".into());
        ctx.displayed_pois.insert("a".into());
        ctx.last_displayed_pois = vec!["b".into()];
        ctx.conversation_turn = 2;

        let summary = ctx.summary();
        assert_eq!(summary.displayed_pois, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(summary.last_displayed_pois, vec!["b".to_string()]);
        assert_eq!(summary.conversation_turn, 2);
    }

    #[test]
    fn test_user_context_at() {
        let ctx = UserContext::at(now());
        assert!(ctx.current_location.is_none());
        assert!(ctx.dietary_intent.is_none());
        assert_eq!(ctx.current_time, now());
    }
}
