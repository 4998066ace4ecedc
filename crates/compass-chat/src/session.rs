//! Session lifecycle and per-turn bookkeeping.
//!
//! [`SessionContextStore`] is the only writer of [`SessionContext`]. It owns
//! the TTL, the bounded history window and the displayed-POI invariants;
//! [`SessionSweeper`] evicts idle sessions in the background.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use compass_core::config::SessionConfig;
use compass_core::error::Result;
use compass_core::types::{ConversationEntry, PoiReference, SearchType, SessionContext};

use crate::store::{Clock, InMemorySessionStore, SessionStore, SystemClock};

// =============================================================================
// CompletedTurn
// =============================================================================

/// What one finished query contributes to its session.
#[derive(Debug, Clone)]
pub struct CompletedTurn {
    pub query: String,
    pub search_type: SearchType,
    /// POIs shown to the user this turn, in display order.
    pub shown: Vec<PoiReference>,
}

// =============================================================================
// SessionContextStore
// =============================================================================

/// Manages session contexts on top of a pluggable [`SessionStore`].
pub struct SessionContextStore {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    /// Maximum conversation entries kept per session.
    history_window: usize,
    ttl: Duration,
}

impl SessionContextStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: &SessionConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            history_window: config.history_window,
            ttl: Duration::minutes(i64::from(config.ttl_minutes)),
        }
    }

    /// Start a fresh session for `user_id` and return its id.
    pub async fn create(&self, user_id: &str) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let session = SessionContext::new(session_id.clone(), user_id.to_string(), self.clock.now());
        self.store.put(session).await?;
        info!(session_id = %session_id, user_id, "Session created");
        Ok(session_id)
    }

    /// Load a live session. An expired session is removed and reported as
    /// absent.
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionContext>> {
        let Some(session) = self.store.get(session_id).await? else {
            return Ok(None);
        };
        if self.is_expired(&session) {
            debug!(session_id, "Session expired on access");
            self.store.delete(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Persist `session`, refreshing its last-access time.
    pub async fn update(&self, mut session: SessionContext) -> Result<()> {
        session.last_accessed = self.clock.now();
        self.store.put(session).await
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self.store.delete(session_id).await?;
        if removed {
            info!(session_id, "Session deleted");
        }
        Ok(removed)
    }

    /// Remove every session idle for longer than the TTL.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.store.sweep(self.clock.now() - self.ttl).await
    }

    /// Whether `session` has been idle for longer than the TTL.
    pub fn is_expired(&self, session: &SessionContext) -> bool {
        self.clock.now() - session.last_accessed > self.ttl
    }

    /// Apply a finished turn to `session` in place.
    ///
    /// Appends a history entry (dropping the oldest beyond the window),
    /// unions the shown ids into `displayed_pois`, replaces
    /// `last_displayed_pois` and increments the turn by one. A general search
    /// replaces the result list that later ordinals refer to; follow-ups
    /// keep it.
    pub fn apply_turn(&self, session: &mut SessionContext, turn: CompletedTurn) {
        let now = self.clock.now();
        let shown_ids: Vec<String> = turn.shown.iter().map(|p| p.id.clone()).collect();

        session.conversation_history.push(ConversationEntry {
            query: turn.query.clone(),
            timestamp: now,
            search_type: turn.search_type,
            result_count: turn.shown.len(),
            results: turn.shown.clone(),
        });
        let excess = session
            .conversation_history
            .len()
            .saturating_sub(self.history_window);
        session.conversation_history.drain(..excess);

        session.displayed_pois.extend(shown_ids.iter().cloned());
        session.last_displayed_pois = shown_ids;
        session.conversation_turn += 1;

        session.current_context.last_query = Some(turn.query);
        session.current_context.search_type = Some(turn.search_type);
        if turn.search_type == SearchType::General {
            session.current_context.last_results = turn.shown;
        }
    }

    /// [`apply_turn`](Self::apply_turn) followed by [`update`](Self::update).
    pub async fn record_turn(&self, session: &mut SessionContext, turn: CompletedTurn) -> Result<()> {
        self.apply_turn(session, turn);
        session.last_accessed = self.clock.now();
        self.store.put(session.clone()).await?;
        debug!(
            session_id = %session.session_id,
            turn = session.conversation_turn,
            displayed = session.displayed_pois.len(),
            "Turn recorded"
        );
        Ok(())
    }
}

// =============================================================================
// SessionSweeper
// =============================================================================

/// Background task that periodically evicts expired sessions.
pub struct SessionSweeper {
    sessions: Arc<SessionContextStore>,
    interval: StdDuration,
    shutdown: Arc<Notify>,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionContextStore>, interval: StdDuration) -> Self {
        Self {
            sessions,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sweep every `interval` until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    match self.sessions.sweep_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "Expired sessions swept"),
                        Err(e) => warn!(error = %e, "Session sweep failed"),
                    }
                }
                _ = self.shutdown.notified() => return,
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

// =============================================================================
// Tests
// =============================================================================
