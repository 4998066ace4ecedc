//! Opening-hours collaborator contract.
//!
//! Calendar parsing lives outside this crate. The scorer and the response
//! composer only ever ask the three questions below, always against an
//! explicit `now` so that answers are reproducible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PoiReference;

/// The first future opening of a POI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextOpening {
    pub at: DateTime<Utc>,
    /// Human-readable form, e.g. "at 09:00" or "tomorrow at 10:00".
    pub label: String,
}

/// Open/closed state of a POI at a given instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HoursStatus {
    Open,
    /// Open, but inside the pre-closing threshold.
    ClosingSoon,
    Closed { next: Option<NextOpening> },
}

/// Evaluates opening hours for a POI.
pub trait OpeningHours: Send + Sync {
    fn is_currently_open(&self, poi: &PoiReference, now: DateTime<Utc>) -> bool;

    /// True only while open and within the short pre-closing window.
    fn is_closing_soon(&self, poi: &PoiReference, now: DateTime<Utc>) -> bool;

    /// `None` when the next opening is unknown.
    fn next_opening_time(&self, poi: &PoiReference, now: DateTime<Utc>) -> Option<NextOpening>;

    fn status(&self, poi: &PoiReference, now: DateTime<Utc>) -> HoursStatus {
        if self.is_currently_open(poi, now) {
            if self.is_closing_soon(poi, now) {
                HoursStatus::ClosingSoon
            } else {
                HoursStatus::Open
            }
        } else {
            HoursStatus::Closed {
                next: self.next_opening_time(poi, now),
            }
        }
    }
}

/// Used when no opening-hours collaborator is wired in: every POI reads as
/// closed with no known next opening.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownHours;

impl OpeningHours for UnknownHours {
    fn is_currently_open(&self, _poi: &PoiReference, _now: DateTime<Utc>) -> bool {
        false
    }

    fn is_closing_soon(&self, _poi: &PoiReference, _now: DateTime<Utc>) -> bool {
        false
    }

    fn next_opening_time(&self, _poi: &PoiReference, _now: DateTime<Utc>) -> Option<NextOpening> {
        None
    }
}
