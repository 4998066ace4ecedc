//! Request and reply types for the discovery pipeline.

use serde::{Deserialize, Serialize};

use compass_core::types::{PoiReference, QueryDetection, SessionSummary, SmartScore, UserContext};

/// One user query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub query: String,
    /// Omit to start a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_id: String,
    pub context: UserContext,
}

/// A POI returned for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPoi {
    pub poi: PoiReference,
    /// Whether the POI was shown to the user this turn.
    pub displayed: bool,
    /// Present only for freshly ranked general searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<SmartScore>,
}

/// Everything produced for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub detection: QueryDetection,
    pub results: Vec<ResultPoi>,
    pub answer: String,
    pub session: SessionSummary,
}

impl AssistantReply {
    /// POIs flagged as displayed, in order.
    pub fn displayed(&self) -> impl Iterator<Item = &PoiReference> {
        self.results.iter().filter(|r| r.displayed).map(|r| &r.poi)
    }
}
