//! Response intent derivation.
//!
//! Turns the (optional) NLU result plus the raw query into the flags the
//! response composer branches on. Keyword patterns always run so a missing
//! or partial NLU result still yields sensible flags.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use compass_core::types::IntentRecognitionResult;

// =============================================================================
// Compiled regex sets
// =============================================================================

struct IntentPatterns {
    opening_hours: Vec<Regex>,
    contact: Vec<Regex>,
    time_sensitive: Vec<Regex>,
    comparison: Vec<Regex>,
    informational: Vec<Regex>,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| IntentPatterns {
    opening_hours: mk(&[
        r"(?i)\bopen(?:s|ed|ing)?\b",
        r"(?i)\bclos(?:es|ed|ing)\b",
        r"(?i)\bhours\b",
        r"(?i)\bwhat\s+time\b",
    ]),
    contact: mk(&[
        r"(?i)\b(?:tele)?phone\b",
        r"(?i)\bcall\b",
        r"(?i)\bcontact\b",
        r"(?i)\bwebsite\b",
        r"(?i)\be-?mail\b",
        r"(?i)\breach\s+(?:them|it)\b",
    ]),
    time_sensitive: mk(&[
        r"(?i)\bright\s+now\b",
        r"(?i)\bnow\b",
        r"(?i)\btonight\b",
        r"(?i)\bcurrently\b",
        r"(?i)\bat\s+the\s+moment\b",
        r"(?i)\bstill\b",
        r"(?i)\blate\b",
    ]),
    comparison: mk(&[
        r"(?i)\bcompare\b",
        r"(?i)\bcomparison\b",
        r"(?i)\bbetter\b",
        r"(?i)\bversus\b",
        r"(?i)\bvs\.?\b",
        r"(?i)\bdifference\b",
        r"(?i)\bwhich\s+one\b",
    ]),
    informational: mk(&[
        r"(?i)\btell\s+me\s+(?:more\s+)?about\b",
        r"(?i)\bmore\s+(?:info|information|details)\b",
        r"(?i)\bdetails?\b",
        r"(?i)\bwhere\s+is\b",
        r"(?i)\baddress\b",
        r"(?i)\blocated\b",
        r"(?i)\blocation\b",
        r"(?i)\brat(?:ing|ed)\b",
        r"(?i)\breviews?\b",
        r"(?i)\bwhat\s+is\b",
    ]),
});

struct AspectPatterns {
    hours: Regex,
    contact: Regex,
    address: Regex,
    rating: Regex,
}

static ASPECT_PATTERNS: LazyLock<AspectPatterns> = LazyLock::new(|| AspectPatterns {
    hours: Regex::new(r"(?i)\b(?:open(?:s|ing)?|clos(?:es|ed|ing)|hours)\b")
        .expect("Invalid aspect regex"),
    contact: Regex::new(r"(?i)\b(?:(?:tele)?phone|call|contact|website|e-?mail)\b")
        .expect("Invalid aspect regex"),
    address: Regex::new(r"(?i)\b(?:where|address|located|location|directions|get\s+there)\b")
        .expect("Invalid aspect regex"),
    rating: Regex::new(r"(?i)\b(?:rating|rated|reviews?|stars|good)\b")
        .expect("Invalid aspect regex"),
});

static PROXIMITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:near|nearby|nearest|closest|close\s+(?:to|by)|around\s+here|walking\s+distance)\b")
        .expect("Invalid proximity regex")
});

/// Bare "close" as in closing time; "close to" and "close by" are distance.
static CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bclose\b(\s+(?:to|by)\b)?").expect("Invalid close regex")
});

fn mentions_closing_time(query: &str) -> bool {
    CLOSE_RE
        .captures_iter(query)
        .any(|caps| caps.get(1).is_none())
}

fn mk(pats: &[&str]) -> Vec<Regex> {
    pats.iter()
        .map(|p| Regex::new(p).expect("Invalid intent regex"))
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

// =============================================================================
// ResponseIntent
// =============================================================================

/// The dominant reason behind a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryIntent {
    #[default]
    Search,
    OpeningHours,
    Contact,
    TimeSensitive,
    Comparison,
    Informational,
}

impl PrimaryIntent {
    /// Map an NLU intent label; unknown labels are plain searches.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "opening_hours" | "hours" | "open_status" => PrimaryIntent::OpeningHours,
            "contact" | "contact_info" | "phone" => PrimaryIntent::Contact,
            "time_sensitive" | "time" | "availability" => PrimaryIntent::TimeSensitive,
            "comparison" | "compare" => PrimaryIntent::Comparison,
            "informational" | "information" | "details" | "poi_info" => PrimaryIntent::Informational,
            _ => PrimaryIntent::Search,
        }
    }
}

/// Flags driving response composition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseIntent {
    pub primary: PrimaryIntent,
    pub opening_hours: bool,
    pub contact: bool,
    pub time_sensitive: bool,
    pub comparison: bool,
    pub informational: bool,
}

impl ResponseIntent {
    /// Combine NLU flags (when present) with keyword detection over `query`.
    /// A flag set by either source is set.
    pub fn derive(query: &str, recognized: Option<&IntentRecognitionResult>) -> Self {
        let p = &*INTENT_PATTERNS;
        let time_sensitive = any_match(&p.time_sensitive, query);
        let hours_words = any_match(&p.opening_hours, query) || mentions_closing_time(query);
        let mut intent = ResponseIntent {
            primary: PrimaryIntent::Search,
            // "what's open right now?" wants the aggregate, not per-place hours.
            opening_hours: hours_words && !time_sensitive,
            contact: any_match(&p.contact, query),
            time_sensitive,
            comparison: any_match(&p.comparison, query),
            informational: any_match(&p.informational, query),
        };

        if let Some(nlu) = recognized {
            let ctx = &nlu.intent_context;
            intent.opening_hours |= ctx.opening_hours_related;
            intent.contact |= ctx.contact_related;
            intent.time_sensitive |= ctx.time_related;
            intent.comparison |= ctx.comparison_related;

            let labels = std::iter::once(nlu.primary_intent.as_str())
                .chain(nlu.secondary_intents.iter().map(String::as_str))
                .map(PrimaryIntent::from_label);
            for label in labels {
                intent.set(label);
            }

            let primary = PrimaryIntent::from_label(&nlu.primary_intent);
            if primary != PrimaryIntent::Search {
                intent.primary = primary;
                return intent;
            }
        }

        intent.primary = intent.strongest();
        intent
    }

    fn set(&mut self, label: PrimaryIntent) {
        match label {
            PrimaryIntent::OpeningHours => self.opening_hours = true,
            PrimaryIntent::Contact => self.contact = true,
            PrimaryIntent::TimeSensitive => self.time_sensitive = true,
            PrimaryIntent::Comparison => self.comparison = true,
            PrimaryIntent::Informational => self.informational = true,
            PrimaryIntent::Search => {}
        }
    }

    /// First set flag in composer priority order.
    fn strongest(&self) -> PrimaryIntent {
        if self.opening_hours {
            PrimaryIntent::OpeningHours
        } else if self.contact {
            PrimaryIntent::Contact
        } else if self.time_sensitive {
            PrimaryIntent::TimeSensitive
        } else if self.comparison {
            PrimaryIntent::Comparison
        } else if self.informational {
            PrimaryIntent::Informational
        } else {
            PrimaryIntent::Search
        }
    }
}

// =============================================================================
// Aspects
// =============================================================================

/// Which facets of a single POI the user asked about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryAspects {
    pub hours: bool,
    pub contact: bool,
    pub address: bool,
    pub rating: bool,
}

impl QueryAspects {
    pub fn detect(query: &str) -> Self {
        let p = &*ASPECT_PATTERNS;
        QueryAspects {
            hours: p.hours.is_match(query) || mentions_closing_time(query),
            contact: p.contact.is_match(query),
            address: p.address.is_match(query),
            rating: p.rating.is_match(query),
        }
    }

    pub fn any(&self) -> bool {
        self.hours || self.contact || self.address || self.rating
    }
}

/// Whether the query asks for something close by.
pub fn is_proximity_query(query: &str) -> bool {
    PROXIMITY_RE.is_match(query)
}
