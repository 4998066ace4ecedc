//! Conversational core for Compass.
//!
//! Classifies discovery queries against the previous turn, resolves
//! references to earlier results, ranks fresh candidates, composes a
//! plain-text answer and keeps per-session context.

pub mod classifier;
pub mod collaborators;
pub mod error;
pub mod intent;
pub mod orchestrator;
pub mod resolver;
pub mod response;
pub mod session;
pub mod store;
pub mod types;

pub use classifier::QueryClassifier;
pub use collaborators::{
    best_effort, CallOutcome, CandidateSource, FollowUpAnalyzer, IntentRecognizer,
    StaticCandidateSource,
};
pub use error::{ChatError, CollaboratorError};
pub use intent::{PrimaryIntent, ResponseIntent};
pub use orchestrator::DiscoveryOrchestrator;
pub use resolver::{ReferenceResolver, Resolved};
pub use response::{ComposeRequest, ResponseComposer};
pub use session::{CompletedTurn, SessionContextStore, SessionSweeper};
pub use store::{Clock, InMemorySessionStore, ManualClock, SessionStore, SystemClock};
pub use types::{AssistantReply, DiscoveryRequest, ResultPoi};
