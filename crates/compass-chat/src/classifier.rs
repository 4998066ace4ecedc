//! Query classification: general search, specific POI, or contextual
//! follow-up.
//!
//! The semantic analyzer is consulted first when configured. Whatever it
//! says about a non-follow-up, and whenever it fails or times out, the
//! deterministic rules decide, in this order:
//!
//! 1. positional reference into the previous results
//! 2. direct mention of a previous POI's name
//! 3. keyword table match against a previous title
//! 4. general search
//!
//! A reference such as "the first one" with no previous results at all is
//! still a follow-up: it becomes a contextual search over the empty set.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use compass_core::config::ClassifierConfig;
use compass_core::types::{
    DetectionRule, IntentRecognitionResult, PoiReference, QueryDetection, SearchType,
    SemanticFollowUpAnalysis,
};

use crate::collaborators::{best_effort, CallOutcome, FollowUpAnalyzer};
use crate::resolver::{ReferenceResolver, Resolved};

pub const POSITIONAL_CONFIDENCE: f64 = 0.9;
pub const POSITIONAL_FOLLOW_UP_CONFIDENCE: f64 = 0.95;
pub const DIRECT_MENTION_CONFIDENCE: f64 = 0.8;
pub const KEYWORD_CONFIDENCE: f64 = 0.7;
pub const FOLLOW_UP_LANGUAGE_CONFIDENCE: f64 = 0.6;
pub const GENERAL_CONFIDENCE: f64 = 0.5;

static FOLLOW_UP_CUES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:that|this)\s+(?:one|place)\b",
        r"(?i)\bthe\s+(?:first|second|third|fourth|fifth|last|final)\b",
        r"(?i)\b(?:it|its|it's|they|them|those|these)\b",
        r"(?i)\bwhich\s+one\b",
        r"(?i)\bone\s+of\s+them\b",
        r"(?i)\b(?:what|how)\s+about\b",
        r"(?i)\btell\s+me\s+more\b",
        r"(?i)\bthe\s+same\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid follow-up regex"))
    .collect()
});

/// Whether the query reads like a reference back to earlier results.
pub fn has_follow_up_language(query: &str) -> bool {
    FOLLOW_UP_CUES.iter().any(|re| re.is_match(query))
}

/// Decides how a query relates to the previous turn.
pub struct QueryClassifier {
    resolver: ReferenceResolver,
    analyzer: Option<Arc<dyn FollowUpAnalyzer>>,
    analysis_timeout: Duration,
}

impl QueryClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            resolver: ReferenceResolver::new(&config.keyword_rules),
            analyzer: None,
            analysis_timeout: Duration::from_millis(config.analysis_timeout_ms),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn FollowUpAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Classify `query` against `previous`. Never fails; `intent` is passed
    /// through to the detection unchanged.
    pub async fn classify(
        &self,
        query: &str,
        previous: &[PoiReference],
        intent: Option<IntentRecognitionResult>,
    ) -> QueryDetection {
        if let Some(analyzer) = &self.analyzer {
            let outcome = best_effort(
                "follow_up_analyzer",
                self.analysis_timeout,
                analyzer.analyze(query, previous),
            )
            .await;
            if let CallOutcome::Completed(analysis) = outcome {
                if analysis.is_follow_up {
                    let detection = self.from_analysis(query, &analysis, previous, intent);
                    debug!(
                        search_type = ?detection.search_type,
                        confidence = detection.confidence,
                        "Follow-up confirmed by analyzer"
                    );
                    return detection;
                }
            }
        }

        self.classify_deterministic(query, previous, intent)
    }

    /// Rule-based classification with no collaborator involvement.
    pub fn classify_deterministic(
        &self,
        query: &str,
        previous: &[PoiReference],
        intent: Option<IntentRecognitionResult>,
    ) -> QueryDetection {
        let follow_up_language = has_follow_up_language(query);

        let detection = if let Some(hit) = self.resolver.resolve_positional(query, previous) {
            let confidence = if follow_up_language {
                POSITIONAL_FOLLOW_UP_CONFIDENCE
            } else {
                POSITIONAL_CONFIDENCE
            };
            specific(hit, confidence, DetectionRule::Positional, intent)
        } else if let Some(hit) = self.resolver.resolve_named(query, previous) {
            specific(hit, DIRECT_MENTION_CONFIDENCE, DetectionRule::DirectMention, intent)
        } else if let Some(hit) = self.resolver.resolve_keyword(query, previous) {
            specific(hit, KEYWORD_CONFIDENCE, DetectionRule::KeywordSemantic, intent)
        } else if previous.is_empty() && follow_up_language && looks_like_reference_only(query) {
            // Nothing to refer to, but the query is not a fresh search either.
            contextual(FOLLOW_UP_LANGUAGE_CONFIDENCE, DetectionRule::FollowUpLanguage, intent)
        } else {
            QueryDetection {
                search_type: SearchType::General,
                target_poi: None,
                is_specific: false,
                confidence: GENERAL_CONFIDENCE,
                intent_recognition: intent,
                rule: DetectionRule::General,
            }
        };

        debug!(
            search_type = ?detection.search_type,
            rule = ?detection.rule,
            confidence = detection.confidence,
            "Query classified"
        );
        detection
    }

    /// The analyzer's hint is tried first, then the query text itself.
    fn from_analysis(
        &self,
        query: &str,
        analysis: &SemanticFollowUpAnalysis,
        previous: &[PoiReference],
        intent: Option<IntentRecognitionResult>,
    ) -> QueryDetection {
        let confidence = if analysis.confidence.is_finite() {
            analysis.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let target = analysis
            .target_poi
            .as_deref()
            .and_then(|hint| self.resolver.resolve(hint, previous))
            .or_else(|| self.resolver.resolve(query, previous));

        match target {
            Some(hit) => specific(hit, confidence, DetectionRule::SemanticAnalysis, intent),
            None => contextual(confidence, DetectionRule::SemanticAnalysis, intent),
        }
    }
}

/// Ordinal or pronoun references with no search terms of their own.
fn looks_like_reference_only(query: &str) -> bool {
    static ORDINAL_REF: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(?:(?:that|this)\s+one|the\s+(?:first|second|third|fourth|fifth|last|final)|it|them|those|these)\b")
            .expect("Invalid reference regex")
    });
    ORDINAL_REF.is_match(query)
}

fn specific(
    hit: Resolved<'_>,
    confidence: f64,
    rule: DetectionRule,
    intent: Option<IntentRecognitionResult>,
) -> QueryDetection {
    QueryDetection {
        search_type: SearchType::Specific,
        target_poi: Some(hit.poi.clone()),
        is_specific: true,
        confidence,
        intent_recognition: intent,
        rule,
    }
}

fn contextual(
    confidence: f64,
    rule: DetectionRule,
    intent: Option<IntentRecognitionResult>,
) -> QueryDetection {
    QueryDetection {
        search_type: SearchType::Contextual,
        target_poi: None,
        is_specific: false,
        confidence,
        intent_recognition: intent,
        rule,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::CollaboratorError;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new(&ClassifierConfig::default())
    }

    fn previous() -> Vec<PoiReference> {
        vec![
            PoiReference::new("p1", "Casa Pepe"),
            PoiReference::new("p2", "El Pescador"),
            PoiReference::new("p3", "Aquasports"),
        ]
    }

    struct FixedAnalyzer(SemanticFollowUpAnalysis);

    #[async_trait]
    impl FollowUpAnalyzer for FixedAnalyzer {
        async fn analyze(
            &self,
            _query: &str,
            _previous: &[PoiReference],
        ) -> Result<SemanticFollowUpAnalysis, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl FollowUpAnalyzer for FailingAnalyzer {
        async fn analyze(
            &self,
            _query: &str,
            _previous: &[PoiReference],
        ) -> Result<SemanticFollowUpAnalysis, CollaboratorError> {
            Err(CollaboratorError::Unavailable)
        }
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl FollowUpAnalyzer for SlowAnalyzer {
        async fn analyze(
            &self,
            _query: &str,
            _previous: &[PoiReference],
        ) -> Result<SemanticFollowUpAnalysis, CollaboratorError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(analysis(true, 0.99, Some("third")))
        }
    }

    fn analysis(is_follow_up: bool, confidence: f64, target: Option<&str>) -> SemanticFollowUpAnalysis {
        SemanticFollowUpAnalysis {
            is_follow_up,
            confidence,
            intent: None,
            reasoning: None,
            target_poi: target.map(str::to_string),
        }
    }

    // ---- Deterministic rules ----

    #[tokio::test]
    async fn test_positional_with_follow_up_language() {
        let d = classifier()
            .classify("When is the first one open today?", &previous(), None)
            .await;
        assert_eq!(d.search_type, SearchType::Specific);
        assert!(d.is_specific);
        assert_eq!(d.target_poi.unwrap().title, "Casa Pepe");
        assert_eq!(d.confidence, POSITIONAL_FOLLOW_UP_CONFIDENCE);
        assert_eq!(d.rule, DetectionRule::Positional);
    }

    #[test]
    fn test_positional_without_follow_up_language() {
        let d = classifier().classify_deterministic("number 2 please", &previous(), None);
        assert_eq!(d.target_poi.unwrap().title, "El Pescador");
        assert_eq!(d.confidence, POSITIONAL_CONFIDENCE);
    }

    #[test]
    fn test_direct_mention() {
        let d = classifier().classify_deterministic("does el pescador do takeaway?", &previous(), None);
        assert_eq!(d.search_type, SearchType::Specific);
        assert_eq!(d.target_poi.unwrap().id, "p2");
        assert_eq!(d.confidence, DIRECT_MENTION_CONFIDENCE);
        assert_eq!(d.rule, DetectionRule::DirectMention);
    }

    #[test]
    fn test_keyword_match() {
        let prev = vec![
            PoiReference::new("p1", "Casa Pepe"),
            PoiReference::new("p9", "Peñón de Ifach"),
        ];
        let d = classifier().classify_deterministic("how long to climb the rock", &prev, None);
        assert_eq!(d.target_poi.unwrap().id, "p9");
        assert_eq!(d.confidence, KEYWORD_CONFIDENCE);
        assert_eq!(d.rule, DetectionRule::KeywordSemantic);
    }

    #[test]
    fn test_unresolved_follow_up_language_is_general() {
        let d = classifier().classify_deterministic("are any of them cheap?", &previous(), None);
        assert_eq!(d.search_type, SearchType::General);
        assert_eq!(d.rule, DetectionRule::General);
        assert_eq!(d.confidence, GENERAL_CONFIDENCE);
    }

    #[test]
    fn test_what_about_new_topic_is_fresh_search() {
        for q in ["what about vegan restaurants?", "how about museums", "tell me more about beaches"] {
            let d = classifier().classify_deterministic(q, &previous(), None);
            assert_eq!(d.search_type, SearchType::General, "query: {}", q);
            assert!(d.target_poi.is_none(), "query: {}", q);
        }
    }

    #[test]
    fn test_general_search() {
        let d = classifier().classify_deterministic("best beaches for families", &previous(), None);
        assert_eq!(d.search_type, SearchType::General);
        assert!(!d.is_specific);
        assert!(d.target_poi.is_none());
        assert_eq!(d.confidence, GENERAL_CONFIDENCE);
    }

    #[test]
    fn test_general_when_no_history() {
        let d = classifier().classify_deterministic("vegan restaurants", &[], None);
        assert_eq!(d.search_type, SearchType::General);
    }

    #[test]
    fn test_follow_up_with_empty_history_does_not_panic() {
        let d = classifier().classify_deterministic("is the first one open?", &[], None);
        assert_eq!(d.search_type, SearchType::Contextual);
        assert!(d.target_poi.is_none());
        assert_eq!(d.confidence, FOLLOW_UP_LANGUAGE_CONFIDENCE);
        assert_eq!(d.rule, DetectionRule::FollowUpLanguage);
    }

    #[test]
    fn test_empty_history_new_topic_is_general() {
        let d = classifier().classify_deterministic("what about vegan places?", &[], None);
        assert_eq!(d.search_type, SearchType::General);
    }

    #[test]
    fn test_out_of_bounds_positional_falls_through() {
        let d = classifier().classify_deterministic("what about the fifth one?", &previous(), None);
        assert_eq!(d.search_type, SearchType::General);
        assert_eq!(d.rule, DetectionRule::General);
        assert!(d.target_poi.is_none());
    }

    #[test]
    fn test_confidence_ordering() {
        let rules = [
            POSITIONAL_FOLLOW_UP_CONFIDENCE,
            POSITIONAL_CONFIDENCE,
            DIRECT_MENTION_CONFIDENCE,
            KEYWORD_CONFIDENCE,
            FOLLOW_UP_LANGUAGE_CONFIDENCE,
            GENERAL_CONFIDENCE,
        ];
        assert!(rules.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_intent_passed_through() {
        let intent = IntentRecognitionResult {
            primary_intent: "opening_hours".to_string(),
            secondary_intents: vec![],
            confidence: 0.8,
            intent_context: Default::default(),
        };
        let d = classifier().classify_deterministic("is the second one open", &previous(), Some(intent.clone()));
        assert_eq!(d.intent_recognition, Some(intent));
    }

    // ---- Analyzer ----

    #[tokio::test]
    async fn test_analyzer_follow_up_with_target() {
        let c = classifier().with_analyzer(Arc::new(FixedAnalyzer(analysis(true, 0.88, Some("Aquasports")))));
        let d = c.classify("can I rent gear there?", &previous(), None).await;
        assert_eq!(d.search_type, SearchType::Specific);
        assert_eq!(d.target_poi.unwrap().id, "p3");
        assert_eq!(d.confidence, 0.88);
        assert_eq!(d.rule, DetectionRule::SemanticAnalysis);
    }

    #[tokio::test]
    async fn test_analyzer_follow_up_unresolvable_target_is_contextual() {
        let c = classifier().with_analyzer(Arc::new(FixedAnalyzer(analysis(true, 0.7, Some("the museum")))));
        let d = c.classify("is the museum open", &previous(), None).await;
        assert_eq!(d.search_type, SearchType::Contextual);
        assert!(d.target_poi.is_none());
        assert_eq!(d.rule, DetectionRule::SemanticAnalysis);
    }

    #[tokio::test]
    async fn test_analyzer_without_hint_resolves_from_query() {
        let c = classifier().with_analyzer(Arc::new(FixedAnalyzer(analysis(true, 0.8, None))));
        let d = c.classify("and the second one?", &previous(), None).await;
        assert_eq!(d.search_type, SearchType::Specific);
        assert_eq!(d.target_poi.unwrap().id, "p2");
        assert_eq!(d.rule, DetectionRule::SemanticAnalysis);
    }

    #[tokio::test]
    async fn test_analyzer_confidence_is_clamped() {
        let c = classifier().with_analyzer(Arc::new(FixedAnalyzer(analysis(true, 1.7, None))));
        let d = c.classify("and those?", &previous(), None).await;
        assert_eq!(d.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_analyzer_not_follow_up_uses_rules() {
        let c = classifier().with_analyzer(Arc::new(FixedAnalyzer(analysis(false, 0.9, None))));
        let d = c.classify("the second one", &previous(), None).await;
        assert_eq!(d.rule, DetectionRule::Positional);
        assert_eq!(d.target_poi.unwrap().id, "p2");
    }

    #[tokio::test]
    async fn test_failing_analyzer_matches_no_analyzer() {
        let query = "When is the first one open today?";
        let with_failure = classifier()
            .with_analyzer(Arc::new(FailingAnalyzer))
            .classify(query, &previous(), None)
            .await;
        let without = classifier().classify(query, &previous(), None).await;
        assert_eq!(with_failure, without);
    }

    #[tokio::test]
    async fn test_slow_analyzer_times_out_to_rules() {
        let config = ClassifierConfig {
            analysis_timeout_ms: 20,
            ..Default::default()
        };
        let c = QueryClassifier::new(&config).with_analyzer(Arc::new(SlowAnalyzer));
        let d = c.classify("the second one", &previous(), None).await;
        assert_eq!(d.rule, DetectionRule::Positional);
        assert_eq!(d.target_poi.unwrap().id, "p2");
    }

    // ---- Follow-up cues ----

    #[test]
    fn test_follow_up_cues() {
        assert!(has_follow_up_language("is that one open?"));
        assert!(has_follow_up_language("tell me more"));
        assert!(has_follow_up_language("what about the last"));
        assert!(!has_follow_up_language("seafood near the port"));
    }
}
