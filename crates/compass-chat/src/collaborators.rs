//! External collaborator seams and the best-effort call wrapper.
//!
//! Every collaborator call goes through [`best_effort`], which bounds it with
//! a timeout and turns the result into an explicit [`CallOutcome`]. Callers
//! branch on the outcome tag; a failed or timed-out call degrades to a local
//! fallback and never fails the request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use compass_core::types::{
    IntentRecognitionResult, PoiReference, RawCandidate, SemanticFollowUpAnalysis, UserContext,
};

use crate::error::CollaboratorError;

/// Semantic (typically LLM-backed) follow-up detection.
#[async_trait]
pub trait FollowUpAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        query: &str,
        previous_results: &[PoiReference],
    ) -> Result<SemanticFollowUpAnalysis, CollaboratorError>;
}

/// Natural-language intent recognition.
#[async_trait]
pub trait IntentRecognizer: Send + Sync {
    async fn recognize(
        &self,
        query: &str,
        previous_results: &[PoiReference],
    ) -> Result<IntentRecognitionResult, CollaboratorError>;
}

/// Vector similarity search producing raw candidates.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<RawCandidate>, CollaboratorError>;
}

/// Result of a timeout-bounded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut,
}

impl<T> CallOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, CallOutcome::Completed(_))
    }

    /// The value, discarding the failure reason.
    pub fn completed(self) -> Option<T> {
        match self {
            CallOutcome::Completed(value) => Some(value),
            CallOutcome::Failed(_) | CallOutcome::TimedOut => None,
        }
    }
}

/// Run a collaborator call under `timeout`.
///
/// Failures and timeouts are logged at `warn` and returned as outcomes.
/// No retries are attempted.
pub async fn best_effort<T, F>(collaborator: &'static str, timeout: Duration, call: F) -> CallOutcome<T>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => CallOutcome::Completed(value),
        Ok(Err(e)) => {
            warn!(collaborator, error = %e, "Collaborator call failed, using fallback");
            CallOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!(
                collaborator,
                timeout_ms = timeout.as_millis() as u64,
                "Collaborator call timed out, using fallback"
            );
            CallOutcome::TimedOut
        }
    }
}

/// Candidate source that returns a fixed list, truncated to `limit`.
///
/// Useful for tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidateSource {
    candidates: Vec<RawCandidate>,
}

impl StaticCandidateSource {
    pub fn new(candidates: Vec<RawCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSource for StaticCandidateSource {
    async fn search(
        &self,
        _query: &str,
        _user: &UserContext,
        limit: usize,
    ) -> Result<Vec<RawCandidate>, CollaboratorError> {
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
}
