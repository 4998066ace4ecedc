use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CompassError, Result};

/// Top-level configuration for the Compass assistant core.
///
/// Loaded from a TOML file. Every section falls back to its defaults when
/// absent, so a partial file is always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompassConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub response: ResponseConfig,
}

impl CompassConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CompassConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CompassError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Request-level assistant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub enabled: bool,
    /// Maximum query length in characters.
    pub max_query_length: usize,
    /// Number of ranked results flagged as displayed per turn.
    pub display_limit: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_query_length: 2000,
            display_limit: 5,
        }
    }
}

/// Session context retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Conversation entries kept per session.
    pub history_window: usize,
    /// Idle minutes before a session expires.
    pub ttl_minutes: u32,
    /// Seconds between background sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            ttl_minutes: 30,
            sweep_interval_secs: 60,
        }
    }
}

/// Maps descriptive words to the canonical name of a POI that may appear in
/// previous results ("the rock" -> "Peñón de Ifach").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub poi_name: String,
}

impl KeywordRule {
    pub fn new(keywords: &[&str], poi_name: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            poi_name: poi_name.to_string(),
        }
    }
}

fn default_keyword_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(&["rock", "ifach", "penon", "peñon", "peñón"], "Peñón de Ifach"),
        KeywordRule::new(&["seafood", "fish", "fisherman"], "El Pescador"),
        KeywordRule::new(
            &["diving", "snorkel", "snorkeling", "kayak", "paddle"],
            "Aquasports",
        ),
        KeywordRule::new(&["tapas", "paella"], "Casa Pepe"),
        KeywordRule::new(&["salt lake", "flamingo", "flamingos"], "Las Salinas"),
        KeywordRule::new(&["market", "mercado"], "Mercado"),
    ]
}

/// Query classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Timeout for the semantic follow-up analyzer.
    pub analysis_timeout_ms: u64,
    /// Timeout for the intent recognizer.
    pub intent_timeout_ms: u64,
    /// Ordered keyword-to-POI table; first matching rule wins.
    pub keyword_rules: Vec<KeywordRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_ms: 1500,
            intent_timeout_ms: 1000,
            keyword_rules: default_keyword_rules(),
        }
    }
}

/// Candidate retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates requested from the vector-search collaborator.
    pub candidate_limit: usize,
    pub search_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 20,
            search_timeout_ms: 3000,
        }
    }
}

/// Weights of the eight scoring components.
///
/// The defaults sum to 1.10 and are not renormalized, so a
/// total score can exceed 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub semantic_similarity: f64,
    pub user_rating: f64,
    pub distance: f64,
    pub freshness: f64,
    pub popularity: f64,
    pub dietary_intent: f64,
    pub category_relevance: f64,
    pub general_intent: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic_similarity: 0.30,
            user_rating: 0.20,
            distance: 0.20,
            freshness: 0.10,
            popularity: 0.10,
            dietary_intent: 0.05,
            category_relevance: 0.05,
            general_intent: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.semantic_similarity
            + self.user_rating
            + self.distance
            + self.freshness
            + self.popularity
            + self.dietary_intent
            + self.category_relevance
            + self.general_intent
    }
}

/// Per-component enable flags. A disabled component contributes 0 and its
/// weight is not handed to the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringFlags {
    pub semantic: bool,
    pub rating: bool,
    pub distance: bool,
    pub freshness: bool,
    pub popularity: bool,
    pub dietary_intent: bool,
    pub category_relevance: bool,
    pub general_intent: bool,
}

impl Default for ScoringFlags {
    fn default() -> Self {
        Self {
            semantic: true,
            rating: true,
            distance: true,
            freshness: true,
            popularity: true,
            dietary_intent: true,
            category_relevance: true,
            general_intent: true,
        }
    }
}

/// Candidate scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Default radius when the user sets none.
    pub max_distance_km: f64,
    /// Drop candidates beyond the radius instead of scoring distance as 0.
    pub exclude_beyond_max_distance: bool,
    pub freshness_half_life_days: f64,
    /// Review count at which popularity saturates to 1.0.
    pub popularity_saturation: u64,
    pub weights: ScoringWeights,
    pub flags: ScoringFlags,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_distance_km: 10.0,
            exclude_beyond_max_distance: false,
            freshness_half_life_days: 90.0,
            popularity_saturation: 1000,
            weights: ScoringWeights::default(),
            flags: ScoringFlags::default(),
        }
    }
}

/// Answer composition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// POIs listed per answer.
    pub max_listed: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self { max_listed: 3 }
    }
}
