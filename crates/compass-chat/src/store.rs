//! Session persistence and the clock it is measured against.
//!
//! [`SessionStore`] is the key-value seam behind
//! [`crate::session::SessionContextStore`]; the in-memory implementation is
//! the default. Clocks are injectable so expiry is testable.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use compass_core::error::{CompassError, Result};
use compass_core::types::SessionContext;

// =============================================================================
// Clock
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// Key-value storage for session contexts, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionContext>>;

    /// Insert or replace.
    async fn put(&self, session: SessionContext) -> Result<()>;

    /// Returns whether a session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Remove every session last accessed before `cutoff`. Returns the
    /// number removed.
    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CompassError {
    CompassError::Storage("session map lock poisoned".to_string())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionContext>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn put(&self, session: SessionContext) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(sessions.remove(session_id).is_some())
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_accessed >= cutoff);
        Ok(before - sessions.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }
}
