//! Response composition for discovery queries.
//!
//! Turns the response intent and the ordered POIs for a turn into a single
//! plain-text answer without requiring an LLM. Branches are tried in a fixed
//! priority order and only the first match fires.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use compass_core::hours::{HoursStatus, NextOpening, OpeningHours};
use compass_core::types::{Coordinates, PoiReference};

use crate::intent::{is_proximity_query, QueryAspects, ResponseIntent};

// =============================================================================
// ComposeRequest
// =============================================================================

/// Everything the composer needs for one answer.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    pub user_query: &'a str,
    pub intent: &'a ResponseIntent,
    /// In display order.
    pub pois: &'a [PoiReference],
    pub user_location: Option<Coordinates>,
    /// Defaults to the wall clock.
    pub current_time: Option<DateTime<Utc>>,
}

// =============================================================================
// ResponseComposer
// =============================================================================

/// Builds plain-text answers.
pub struct ResponseComposer {
    hours: Arc<dyn OpeningHours>,
    /// Maximum POIs named in list-style answers.
    max_listed: usize,
}

impl ResponseComposer {
    pub fn new(hours: Arc<dyn OpeningHours>, max_listed: usize) -> Self {
        Self {
            hours,
            max_listed: max_listed.max(1),
        }
    }

    pub fn compose(&self, req: &ComposeRequest<'_>) -> String {
        let now = req.current_time.unwrap_or_else(Utc::now);
        let intent = req.intent;

        if req.pois.is_empty() {
            return self.no_results(req.user_query, intent);
        }
        if intent.opening_hours {
            return self.hours_answer(req.pois, now);
        }
        if intent.contact {
            return self.contact_answer(req.pois);
        }
        if intent.time_sensitive {
            return self.availability_summary(req.pois, now);
        }
        if intent.comparison && req.pois.len() >= 2 {
            return self.comparison(req.pois, req.user_location);
        }
        if intent.informational && req.pois.len() == 1 {
            return self.poi_details(&req.pois[0], req.user_query, req.user_location, now);
        }
        self.default_answer(req.pois, req.user_location)
    }

    fn listed<'a>(&self, pois: &'a [PoiReference]) -> &'a [PoiReference] {
        &pois[..pois.len().min(self.max_listed)]
    }

    // ---- 1. No results ----

    fn no_results(&self, query: &str, intent: &ResponseIntent) -> String {
        if intent.opening_hours || QueryAspects::detect(query).hours {
            "I couldn't find any places to check opening hours for. Try searching for a place first."
                .to_string()
        } else if is_proximity_query(query) {
            "I couldn't find any places nearby that match. Try widening the area or a different search."
                .to_string()
        } else {
            "I couldn't find any places matching your request. Try rephrasing or searching for something else."
                .to_string()
        }
    }

    // ---- 2. Opening hours ----

    fn hours_answer(&self, pois: &[PoiReference], now: DateTime<Utc>) -> String {
        if let [poi] = pois {
            let name = &poi.title;
            return match self.hours.status(poi, now) {
                HoursStatus::Open => format!("Yes, {} is currently open.", name),
                HoursStatus::ClosingSoon => format!("Yes, {} is open, but closing soon.", name),
                HoursStatus::Closed { next: Some(next) } => {
                    format!("No, {} is currently closed. It opens {}.", name, next.label)
                }
                HoursStatus::Closed { next: None } => format!("No, {} is currently closed.", name),
            };
        }

        self.listed(pois)
            .iter()
            .map(|poi| format!("{}: {}", poi.title, status_phrase(&self.hours.status(poi, now))))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ---- 3. Contact ----

    fn contact_answer(&self, pois: &[PoiReference]) -> String {
        let listed = self.listed(pois);
        let lines: Vec<Option<String>> = listed.iter().map(contact_line).collect();

        if lines.iter().all(Option::is_none) {
            let names: Vec<&str> = listed.iter().map(|p| p.title.as_str()).collect();
            return format!(
                "Sorry, I don't have contact information for {}.",
                join_names(&names)
            );
        }

        listed
            .iter()
            .zip(lines)
            .map(|(poi, line)| {
                line.unwrap_or_else(|| format!("{}: no contact info available", poi.title))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ---- 4. Time-sensitive aggregate ----

    fn availability_summary(&self, pois: &[PoiReference], now: DateTime<Utc>) -> String {
        let mut open = Vec::new();
        let mut closing = Vec::new();
        let mut soonest: Option<(&str, NextOpening)> = None;

        for poi in pois {
            match self.hours.status(poi, now) {
                HoursStatus::Open => open.push(poi.title.as_str()),
                HoursStatus::ClosingSoon => closing.push(poi.title.as_str()),
                HoursStatus::Closed { next: Some(next) } => {
                    if soonest.as_ref().map_or(true, |(_, best)| next.at < best.at) {
                        soonest = Some((poi.title.as_str(), next));
                    }
                }
                HoursStatus::Closed { next: None } => {}
            }
        }

        let mut parts = Vec::new();
        if !open.is_empty() {
            parts.push(format!("Open now: {}.", join_names(&open)));
        }
        if !closing.is_empty() {
            parts.push(format!("Closing soon: {}.", join_names(&closing)));
        }

        match (parts.is_empty(), soonest) {
            (true, Some((name, next))) => format!(
                "None of these are open right now. {} opens soonest, {}.",
                name, next.label
            ),
            (true, None) => {
                "None of these are open right now, and I don't know when they open next."
                    .to_string()
            }
            (false, Some((name, next))) => {
                parts.push(format!("{} opens next, {}.", name, next.label));
                parts.join(" ")
            }
            (false, None) => parts.join(" "),
        }
    }

    // ---- 5. Comparison ----

    fn comparison(&self, pois: &[PoiReference], location: Option<Coordinates>) -> String {
        let mut lines = vec!["Here's how they compare:".to_string()];
        for (rank, poi) in self.listed(pois).iter().enumerate() {
            let rating = poi
                .rating()
                .map(|r| format!("{:.1}/5", r))
                .unwrap_or_else(|| "no rating".to_string());
            let place = poi
                .metadata
                .location
                .clone()
                .unwrap_or_else(|| "location unknown".to_string());
            let mut line = format!("{}. {} - {} - {}", rank + 1, poi.title, rating, place);
            if let Some(km) = distance_to(poi, location) {
                line.push_str(&format!(" ({:.1} km away)", km));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    // ---- 6. Single POI details ----

    fn poi_details(
        &self,
        poi: &PoiReference,
        query: &str,
        location: Option<Coordinates>,
        now: DateTime<Utc>,
    ) -> String {
        let aspects = QueryAspects::detect(query);
        if !aspects.any() {
            return summary_line(poi, location);
        }

        let name = &poi.title;
        let mut sentences = Vec::new();

        if aspects.hours {
            sentences.push(match self.hours.status(poi, now) {
                HoursStatus::Open => format!("{} is open right now.", name),
                HoursStatus::ClosingSoon => format!("{} is open but closing soon.", name),
                HoursStatus::Closed { next: Some(next) } => {
                    format!("{} is closed at the moment and opens {}.", name, next.label)
                }
                HoursStatus::Closed { next: None } => format!("{} is closed at the moment.", name),
            });
        }
        if aspects.contact {
            sentences.push(match contact_line(poi) {
                Some(line) => format!("Contact {}.", line.trim_start_matches(&format!("{}: ", name))),
                None => format!("I don't have contact details for {}.", name),
            });
        }
        if aspects.address {
            let mut sentence = match &poi.metadata.location {
                Some(place) => format!("{} is at {}", name, place),
                None => format!("I don't have an address for {}", name),
            };
            if let Some(km) = distance_to(poi, location) {
                sentence.push_str(&format!(", about {:.1} km from you", km));
            }
            sentence.push('.');
            sentences.push(sentence);
        }
        if aspects.rating {
            sentences.push(match poi.rating() {
                Some(r) => format!("{} is rated {:.1} out of 5.", name, r),
                None => format!("{} doesn't have a rating yet.", name),
            });
        }

        sentences.join(" ")
    }

    // ---- 7. Default ----

    fn default_answer(&self, pois: &[PoiReference], location: Option<Coordinates>) -> String {
        if let [poi] = pois {
            return summary_line(poi, location);
        }

        let mut lines = vec!["Here are the top options:".to_string()];
        for (i, poi) in self.listed(pois).iter().enumerate() {
            let line = match poi.rating() {
                Some(r) => format!("{}. {} ({:.1})", i + 1, poi.title, r),
                None => format!("{}. {}", i + 1, poi.title),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

fn status_phrase(status: &HoursStatus) -> String {
    match status {
        HoursStatus::Open => "open".to_string(),
        HoursStatus::ClosingSoon => "open, closing soon".to_string(),
        HoursStatus::Closed { next: Some(next) } => format!("closed, opens {}", next.label),
        HoursStatus::Closed { next: None } => "closed".to_string(),
    }
}

/// "Name: phone X, website Y", or `None` when neither is known.
fn contact_line(poi: &PoiReference) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(phone) = poi.metadata.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        parts.push(format!("phone {}", phone));
    }
    if let Some(site) = poi.metadata.website.as_deref().filter(|w| !w.trim().is_empty()) {
        parts.push(format!("website {}", site));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("{}: {}", poi.title, parts.join(", ")))
    }
}

/// One-line name, rating and location summary.
fn summary_line(poi: &PoiReference, location: Option<Coordinates>) -> String {
    let mut line = format!("I found {}", poi.title);
    if let Some(r) = poi.rating() {
        line.push_str(&format!(", rated {:.1}/5", r));
    }
    if let Some(place) = &poi.metadata.location {
        line.push_str(&format!(", at {}", place));
    }
    if let Some(km) = distance_to(poi, location) {
        line.push_str(&format!(" ({:.1} km away)", km));
    }
    line.push('.');
    line
}

fn distance_to(poi: &PoiReference, location: Option<Coordinates>) -> Option<f64> {
    let here = location?;
    poi.metadata.coordinates.map(|c| here.distance_km(&c))
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

// =============================================================================
// Tests
// =============================================================================
