//! Discovery orchestrator: central coordinator wiring classification,
//! ranking, composition and session state.
//!
//! One request runs one pipeline. Requests for the same session are
//! serialized by a per-session async lock held for the whole pipeline;
//! different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use compass_core::config::CompassConfig;
use compass_core::hours::OpeningHours;
use compass_core::types::{
    IntentRecognitionResult, PoiReference, SearchType, SessionContext, UserContext,
};
use compass_rank::CandidateScorer;

use crate::classifier::QueryClassifier;
use crate::collaborators::{best_effort, CandidateSource, FollowUpAnalyzer, IntentRecognizer};
use crate::error::ChatError;
use crate::intent::ResponseIntent;
use crate::response::{ComposeRequest, ResponseComposer};
use crate::session::{CompletedTurn, SessionContextStore};
use crate::types::{AssistantReply, DiscoveryRequest, ResultPoi};

type SessionLock = Arc<tokio::sync::Mutex<()>>;

/// Central coordinator for discovery queries.
pub struct DiscoveryOrchestrator {
    config: CompassConfig,
    classifier: QueryClassifier,
    scorer: CandidateScorer,
    composer: ResponseComposer,
    sessions: Arc<SessionContextStore>,
    candidates: Arc<dyn CandidateSource>,
    intents: Option<Arc<dyn IntentRecognizer>>,
    session_locks: Mutex<HashMap<String, SessionLock>>,
}

impl DiscoveryOrchestrator {
    /// Create an orchestrator with an in-memory session store.
    pub fn new(
        config: CompassConfig,
        candidates: Arc<dyn CandidateSource>,
        hours: Arc<dyn OpeningHours>,
    ) -> Self {
        let sessions = Arc::new(SessionContextStore::new(&config.session));
        Self {
            classifier: QueryClassifier::new(&config.classifier),
            scorer: CandidateScorer::new(config.scoring.clone(), Arc::clone(&hours)),
            composer: ResponseComposer::new(hours, config.response.max_listed),
            sessions,
            candidates,
            intents: None,
            session_locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn with_follow_up_analyzer(mut self, analyzer: Arc<dyn FollowUpAnalyzer>) -> Self {
        self.classifier = self.classifier.with_analyzer(analyzer);
        self
    }

    pub fn with_intent_recognizer(mut self, recognizer: Arc<dyn IntentRecognizer>) -> Self {
        self.intents = Some(recognizer);
        self
    }

    /// Replace the session store, e.g. to share it with a [`crate::SessionSweeper`].
    pub fn with_sessions(mut self, sessions: Arc<SessionContextStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionContextStore> {
        &self.sessions
    }

    /// Handle one discovery query.
    ///
    /// An unknown or expired session id starts a new session. Only
    /// validation and session storage can fail; collaborator failures
    /// degrade to fallbacks.
    pub async fn handle_query(&self, request: DiscoveryRequest) -> Result<AssistantReply, ChatError> {
        let DiscoveryRequest {
            query,
            session_id,
            user_id,
            context,
        } = request;

        self.validate(&query)?;
        let query = query.trim();

        let sid = self.resolve_session(session_id.as_deref(), &user_id).await?;
        let lock = self.session_lock(&sid)?;
        let _guard = lock.lock().await;

        let mut session = self
            .sessions
            .get(&sid)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(sid.clone()))?;
        let previous = session.previous_results().to_vec();

        let recognized = self.recognize_intent(query, &previous).await;
        let detection = self.classifier.classify(query, &previous, recognized).await;
        let intent = ResponseIntent::derive(query, detection.intent_recognition.as_ref());

        let results = match (detection.search_type, &detection.target_poi) {
            (SearchType::Specific, Some(target)) => vec![shown(target.clone())],
            (SearchType::Contextual, _) => previous.iter().cloned().map(shown).collect(),
            _ => self.search_and_rank(query, &context).await,
        };
        let displayed: Vec<PoiReference> = results
            .iter()
            .filter(|r| r.displayed)
            .map(|r| r.poi.clone())
            .collect();

        let answer = self.composer.compose(&ComposeRequest {
            user_query: query,
            intent: &intent,
            pois: &displayed,
            user_location: context.current_location,
            current_time: Some(context.current_time),
        });

        self.sessions
            .record_turn(
                &mut session,
                CompletedTurn {
                    query: query.to_string(),
                    search_type: detection.search_type,
                    shown: displayed,
                },
            )
            .await?;

        info!(
            session_id = %sid,
            search_type = ?detection.search_type,
            rule = ?detection.rule,
            results = results.len(),
            turn = session.conversation_turn,
            "Query handled"
        );

        Ok(AssistantReply {
            detection,
            results,
            answer,
            session: session.summary(),
        })
    }

    /// Look up a live session.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionContext, ChatError> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ChatError> {
        if !self.sessions.delete(session_id).await? {
            return Err(ChatError::SessionNotFound(session_id.to_string()));
        }
        let mut locks = self.lock_map()?;
        // A request still holding the lock keeps it; the next sweep drops it.
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
        Ok(())
    }

    /// Evict expired sessions and drop their idle locks.
    pub async fn sweep_expired(&self) -> Result<usize, ChatError> {
        let removed = self.sessions.sweep_expired().await?;
        self.lock_map()?.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(removed)
    }

    // ---- Pipeline steps ----

    fn validate(&self, query: &str) -> Result<(), ChatError> {
        if !self.config.assistant.enabled {
            return Err(ChatError::Disabled);
        }
        if query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let max = self.config.assistant.max_query_length;
        if query.chars().count() > max {
            return Err(ChatError::QueryTooLong(max));
        }
        Ok(())
    }

    async fn resolve_session(&self, session_id: Option<&str>, user_id: &str) -> Result<String, ChatError> {
        if let Some(id) = session_id {
            if self.sessions.get(id).await?.is_some() {
                return Ok(id.to_string());
            }
            debug!(session_id = id, "Unknown or expired session, starting a new one");
        }
        Ok(self.sessions.create(user_id).await?)
    }

    async fn recognize_intent(
        &self,
        query: &str,
        previous: &[PoiReference],
    ) -> Option<IntentRecognitionResult> {
        let recognizer = self.intents.as_ref()?;
        best_effort(
            "intent_recognizer",
            Duration::from_millis(self.config.classifier.intent_timeout_ms),
            recognizer.recognize(query, previous),
        )
        .await
        .completed()
    }

    async fn search_and_rank(&self, query: &str, context: &UserContext) -> Vec<ResultPoi> {
        let candidates = best_effort(
            "candidate_source",
            Duration::from_millis(self.config.search.search_timeout_ms),
            self.candidates
                .search(query, context, self.config.search.candidate_limit),
        )
        .await
        .completed()
        .unwrap_or_default();

        let display_limit = self.config.assistant.display_limit;
        self.scorer
            .rank(candidates, context)
            .into_iter()
            .enumerate()
            .map(|(i, scored)| ResultPoi {
                poi: scored.to_reference(),
                displayed: i < display_limit,
                score: Some(scored.score),
            })
            .collect()
    }

    // ---- Locks ----

    fn lock_map(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionLock>>, ChatError> {
        self.session_locks
            .lock()
            .map_err(|e| ChatError::StorageError(format!("session lock map poisoned: {}", e)))
    }

    fn session_lock(&self, session_id: &str) -> Result<SessionLock, ChatError> {
        Ok(Arc::clone(
            self.lock_map()?
                .entry(session_id.to_string())
                .or_default(),
        ))
    }
}

fn shown(poi: PoiReference) -> ResultPoi {
    ResultPoi {
        poi,
        displayed: true,
        score: None,
    }
}

// =============================================================================
// Tests
// =============================================================================
