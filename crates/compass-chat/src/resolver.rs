//! Reference resolution against previously shown results.
//!
//! Maps a positional word ("the second one"), a quoted or contained POI name,
//! or a descriptive keyword ("the rock") to a concrete [`PoiReference`] from
//! the previous turn. The positional and keyword tables are ordered data
//! consulted by generic matchers; nothing here raises an error, an
//! unresolvable reference is simply `None`.

use std::sync::LazyLock;

use regex::Regex;

use compass_core::config::KeywordRule;
use compass_core::types::PoiReference;

// =============================================================================
// Positional table
// =============================================================================

/// Slot in the previous result list named by an ordinal word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// 0-indexed from the start of the list.
    Index(usize),
    /// The final element, whatever the list length.
    Last,
}

impl Position {
    /// Concrete index for a list of `len` items, or `None` when out of bounds.
    pub fn index_in(self, len: usize) -> Option<usize> {
        match self {
            Position::Index(i) if i < len => Some(i),
            Position::Index(_) => None,
            Position::Last => len.checked_sub(1),
        }
    }
}

/// Ordinal tokens in priority order; the first entry found in the text wins.
pub const POSITIONAL_TOKENS: &[(&[&str], Position)] = &[
    (&["first", "1st", "1"], Position::Index(0)),
    (&["second", "2nd", "2"], Position::Index(1)),
    (&["third", "3rd", "3"], Position::Index(2)),
    (&["fourth", "4th", "4"], Position::Index(3)),
    (&["fifth", "5th", "5"], Position::Index(4)),
    (&["last", "final"], Position::Last),
];

static POSITIONAL_PATTERNS: LazyLock<Vec<(Regex, Position)>> = LazyLock::new(|| {
    POSITIONAL_TOKENS
        .iter()
        .map(|(tokens, position)| (word_alternation(tokens), *position))
        .collect()
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| {
        Regex::new(r#""([^"]+)"|“([^”]+)”|(?:^|[\s(])'([^']+)'"#).expect("Invalid quote regex")
    });

/// Case-insensitive whole-word regex matching any of `words`.
fn word_alternation(words: &[&str]) -> Regex {
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alts.join("|"))).expect("Invalid word regex")
}

// =============================================================================
// Keyword table
// =============================================================================

/// Compiled keyword-to-POI rules, kept in configuration order.
pub struct KeywordMatcher {
    rules: Vec<(Regex, String)>,
}

impl KeywordMatcher {
    pub fn new(rules: &[KeywordRule]) -> Self {
        let rules = rules
            .iter()
            .filter(|r| !r.keywords.is_empty() && !r.poi_name.trim().is_empty())
            .map(|r| {
                let words: Vec<&str> = r.keywords.iter().map(String::as_str).collect();
                (word_alternation(&words), r.poi_name.to_lowercase())
            })
            .collect();
        Self { rules }
    }

    /// Canonical POI names (lowercased) whose keywords appear in `text`, in
    /// rule order.
    pub fn canonical_names<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |(re, _)| re.is_match(text))
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// ReferenceResolver
// =============================================================================

/// Which kind of reference pinned the POI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Positional,
    Named,
    Keyword,
}

/// A resolved reference into the previous result list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolved<'a> {
    pub poi: &'a PoiReference,
    pub index: usize,
    pub kind: ReferenceKind,
}

/// Resolves textual references to previously shown POIs.
pub struct ReferenceResolver {
    keywords: KeywordMatcher,
}

impl ReferenceResolver {
    pub fn new(keyword_rules: &[KeywordRule]) -> Self {
        Self {
            keywords: KeywordMatcher::new(keyword_rules),
        }
    }

    /// Ordinal reference, e.g. "the last one".
    ///
    /// Table entries are tried in order; an entry whose index is out of
    /// bounds counts as no match and the next entry is tried.
    pub fn resolve_positional<'a>(
        &self,
        text: &str,
        previous: &'a [PoiReference],
    ) -> Option<Resolved<'a>> {
        POSITIONAL_PATTERNS
            .iter()
            .filter(|(re, _)| re.is_match(text))
            .find_map(|(_, position)| position.index_in(previous.len()))
            .map(|index| Resolved {
                poi: &previous[index],
                index,
                kind: ReferenceKind::Positional,
            })
    }

    /// A previous POI named in the text.
    ///
    /// Quoted segments are tried first and may name only part of a title.
    /// Otherwise the whole title must appear in the text; when several do,
    /// the longest title wins, then the earliest.
    pub fn resolve_named<'a>(
        &self,
        text: &str,
        previous: &'a [PoiReference],
    ) -> Option<Resolved<'a>> {
        let lower = text.to_lowercase();

        for caps in QUOTED_RE.captures_iter(text) {
            let quoted = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_lowercase())
                .unwrap_or_default();
            if quoted.is_empty() {
                continue;
            }
            let hit = previous.iter().position(|poi| {
                let title = poi.title.to_lowercase();
                title.contains(&quoted) || quoted.contains(&title)
            });
            if let Some(index) = hit {
                return Some(named(previous, index));
            }
        }

        previous
            .iter()
            .enumerate()
            .filter(|(_, poi)| {
                let title = poi.title.trim().to_lowercase();
                !title.is_empty() && lower.contains(&title)
            })
            .max_by(|(ia, a), (ib, b)| {
                a.title
                    .chars()
                    .count()
                    .cmp(&b.title.chars().count())
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(index, _)| named(previous, index))
    }

    /// A previous POI reached through the keyword table. The keyword alone
    /// is not enough: a previous title must contain the canonical name.
    pub fn resolve_keyword<'a>(
        &self,
        text: &str,
        previous: &'a [PoiReference],
    ) -> Option<Resolved<'a>> {
        self.keywords.canonical_names(text).find_map(|canonical| {
            previous
                .iter()
                .position(|poi| poi.title.to_lowercase().contains(canonical))
                .map(|index| Resolved {
                    poi: &previous[index],
                    index,
                    kind: ReferenceKind::Keyword,
                })
        })
    }

    /// Resolve a free-standing reference such as an analyzer hint ("first",
    /// "Casa Pepe", "Pepe"): positional, then named, then keyword. A hint may
    /// also be a fragment of a title.
    pub fn resolve<'a>(&self, reference: &str, previous: &'a [PoiReference]) -> Option<Resolved<'a>> {
        let reference = reference.trim();
        if reference.is_empty() || previous.is_empty() {
            return None;
        }

        self.resolve_positional(reference, previous)
            .or_else(|| self.resolve_named(reference, previous))
            .or_else(|| {
                let fragment = reference.to_lowercase();
                if fragment.chars().count() < 3 {
                    return None;
                }
                previous
                    .iter()
                    .position(|poi| poi.title.to_lowercase().contains(&fragment))
                    .map(|index| named(previous, index))
            })
            .or_else(|| self.resolve_keyword(reference, previous))
    }

    pub fn keywords(&self) -> &KeywordMatcher {
        &self.keywords
    }
}

fn named(previous: &[PoiReference], index: usize) -> Resolved<'_> {
    Resolved {
        poi: &previous[index],
        index,
        kind: ReferenceKind::Named,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::config::ClassifierConfig;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(&ClassifierConfig::default().keyword_rules)
    }

    fn pois(titles: &[&str]) -> Vec<PoiReference> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| PoiReference::new(format!("poi-{}", i), *t))
            .collect()
    }

    fn abc() -> Vec<PoiReference> {
        pois(&["Casa Pepe", "El Pescador", "Aquasports"])
    }

    // ---- Position ----

    #[test]
    fn test_position_index_in_bounds() {
        assert_eq!(Position::Index(1).index_in(3), Some(1));
        assert_eq!(Position::Index(3).index_in(3), None);
        assert_eq!(Position::Last.index_in(3), Some(2));
        assert_eq!(Position::Last.index_in(0), None);
    }

    // ---- Positional ----

    #[test]
    fn test_second_one_resolves_to_b() {
        let prev = abc();
        let r = resolver().resolve_positional("the second one", &prev).unwrap();
        assert_eq!(r.poi.title, "El Pescador");
        assert_eq!(r.index, 1);
        assert_eq!(r.kind, ReferenceKind::Positional);
    }

    #[test]
    fn test_last_one_resolves_to_c() {
        let prev = abc();
        let r = resolver().resolve_positional("what about the last one?", &prev).unwrap();
        assert_eq!(r.poi.title, "Aquasports");
    }

    #[test]
    fn test_final_and_numeric_forms() {
        let prev = abc();
        let res = resolver();
        assert_eq!(res.resolve_positional("the final place", &prev).unwrap().index, 2);
        assert_eq!(res.resolve_positional("number 2 please", &prev).unwrap().index, 1);
        assert_eq!(res.resolve_positional("the 3rd option", &prev).unwrap().index, 2);
    }

    #[test]
    fn test_positional_is_case_insensitive() {
        let prev = abc();
        let r = resolver().resolve_positional("Is The FIRST one open?", &prev).unwrap();
        assert_eq!(r.poi.title, "Casa Pepe");
    }

    #[test]
    fn test_positional_out_of_bounds_is_no_match() {
        let prev = abc();
        assert!(resolver().resolve_positional("the fifth one", &prev).is_none());
    }

    #[test]
    fn test_positional_empty_previous_is_no_match() {
        assert!(resolver().resolve_positional("is the first one open?", &[]).is_none());
    }

    #[test]
    fn test_positional_requires_whole_word() {
        let prev = abc();
        // "10" and "1pm" must not read as "1"
        assert!(resolver().resolve_positional("top 10 things at 1pm", &prev).is_none());
    }

    #[test]
    fn test_positional_table_order_wins() {
        let prev = abc();
        let r = resolver()
            .resolve_positional("compare the last one with the first", &prev)
            .unwrap();
        assert_eq!(r.index, 0);
    }

    // ---- Named ----

    #[test]
    fn test_named_substring_case_insensitive() {
        let prev = abc();
        let r = resolver().resolve_named("does el pescador have a terrace?", &prev).unwrap();
        assert_eq!(r.poi.title, "El Pescador");
        assert_eq!(r.kind, ReferenceKind::Named);
    }

    #[test]
    fn test_named_quoted_fragment() {
        let prev = abc();
        let r = resolver().resolve_named("what about \"Pescador\"?", &prev).unwrap();
        assert_eq!(r.poi.title, "El Pescador");
    }

    #[test]
    fn test_named_single_quoted_fragment() {
        let prev = abc();
        let r = resolver().resolve_named("what's 'aqua' like?", &prev).unwrap();
        assert_eq!(r.poi.title, "Aquasports");
    }

    #[test]
    fn test_named_longest_title_wins() {
        let prev = pois(&["Pepe", "Casa Pepe"]);
        let r = resolver().resolve_named("is casa pepe open", &prev).unwrap();
        assert_eq!(r.poi.title, "Casa Pepe");
    }

    #[test]
    fn test_named_absent_is_no_match() {
        let prev = abc();
        assert!(resolver().resolve_named("any museums?", &prev).is_none());
    }

    // ---- Keyword ----

    #[test]
    fn test_keyword_requires_matching_title() {
        let prev = pois(&["Peñón de Ifach Natural Park", "Casa Pepe"]);
        let r = resolver().resolve_keyword("how high is the rock?", &prev).unwrap();
        assert_eq!(r.poi.title, "Peñón de Ifach Natural Park");
        assert_eq!(r.kind, ReferenceKind::Keyword);
    }

    #[test]
    fn test_keyword_alone_is_insufficient() {
        let prev = abc();
        assert!(resolver().resolve_keyword("how high is the rock?", &prev).is_none());
    }

    #[test]
    fn test_keyword_multiword_phrase() {
        let prev = pois(&["Las Salinas de Calpe"]);
        let r = resolver().resolve_keyword("can I see the salt lake?", &prev).unwrap();
        assert_eq!(r.index, 0);
    }

    #[test]
    fn test_keyword_matcher_skips_empty_rules() {
        let rules = vec![
            KeywordRule::new(&[], "Nowhere"),
            KeywordRule::new(&["castle"], ""),
            KeywordRule::new(&["castle"], "Castell"),
        ];
        let matcher = KeywordMatcher::new(&rules);
        assert_eq!(matcher.len(), 1);
        let names: Vec<&str> = matcher.canonical_names("the castle").collect();
        assert_eq!(names, vec!["castell"]);
    }

    // ---- Hint resolution ----

    #[test]
    fn test_resolve_hint_positional() {
        let prev = abc();
        assert_eq!(resolver().resolve("second", &prev).unwrap().poi.title, "El Pescador");
    }

    #[test]
    fn test_resolve_hint_full_name() {
        let prev = abc();
        assert_eq!(resolver().resolve("Aquasports", &prev).unwrap().index, 2);
    }

    #[test]
    fn test_resolve_hint_fragment() {
        let prev = abc();
        assert_eq!(resolver().resolve("pepe", &prev).unwrap().poi.title, "Casa Pepe");
    }

    #[test]
    fn test_resolve_hint_too_short_fragment() {
        let prev = abc();
        assert!(resolver().resolve("el", &prev).is_none());
    }

    #[test]
    fn test_resolve_empty_inputs() {
        assert!(resolver().resolve("   ", &abc()).is_none());
        assert!(resolver().resolve("first", &[]).is_none());
    }
}
