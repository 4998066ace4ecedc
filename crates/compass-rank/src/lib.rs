//! Candidate ranking for the Compass assistant.
//!
//! Turns raw candidates from the vector-search collaborator into an ordered
//! list annotated with a [`SmartScore`](compass_core::types::SmartScore).

pub mod components;
pub mod scorer;

pub use scorer::{CandidateScorer, ScoredCandidate};
