use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::model::{ConfidenceTier, MatchField};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every tunable of one resolution run. Passed into each run explicitly;
/// there is no process-wide instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f64,
    #[serde(default = "default_weights", deserialize_with = "deserialize_weights")]
    pub weights: BTreeMap<MatchField, f64>,
    #[serde(default)]
    pub thresholds: TierThresholds,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub sources: SourceConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            merge_threshold: default_merge_threshold(),
            weights: default_weights(),
            thresholds: TierThresholds::default(),
            fuzzy: FuzzyConfig::default(),
            blocking: BlockingConfig::default(),
            sources: SourceConfig::default(),
            run: RunConfig::default(),
        }
    }
}

fn default_name() -> String {
    "default".into()
}

fn default_merge_threshold() -> f64 {
    0.70
}

pub fn default_weights() -> BTreeMap<MatchField, f64> {
    BTreeMap::from([
        (MatchField::Ssn, 0.40),
        (MatchField::Ein, 0.35),
        (MatchField::DateOfBirth, 0.30),
        (MatchField::Email, 0.25),
        (MatchField::Phone, 0.20),
        (MatchField::BusinessName, 0.20),
        (MatchField::Name, 0.15),
        (MatchField::Address, 0.15),
    ])
}

fn deserialize_weights<'de, D>(deserializer: D) -> Result<BTreeMap<MatchField, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, weight)| {
            MatchField::from_key(&key)
                .map(|field| (field, weight))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown weight key '{key}'")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Inclusive lower bounds of each confidence tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    #[serde(default = "default_exact")]
    pub exact: f64,
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_low")]
    pub low: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            exact: default_exact(),
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

fn default_exact() -> f64 {
    0.95
}

fn default_high() -> f64 {
    0.85
}

fn default_medium() -> f64 {
    0.70
}

fn default_low() -> f64 {
    0.50
}

impl TierThresholds {
    pub fn tier_for(&self, score: f64) -> ConfidenceTier {
        if score >= self.exact {
            ConfidenceTier::Exact
        } else if score >= self.high {
            ConfidenceTier::High
        } else if score >= self.medium {
            ConfidenceTier::Medium
        } else if score >= self.low {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::NoMatch
        }
    }
}

// ---------------------------------------------------------------------------
// Fuzzy scoring knobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FuzzyConfig {
    /// Jaccard overlap of token sets at which the bonus applies.
    #[serde(default = "default_overlap_min")]
    pub token_overlap_min: f64,
    #[serde(default = "default_overlap_bonus")]
    pub token_overlap_bonus: f64,
    /// Shortest partial SSN/EIN allowed to match by suffix.
    #[serde(default = "default_partial_digits")]
    pub min_partial_id_digits: usize,
    /// Pairs overlapping only on address score 0.0.
    #[serde(default = "default_true")]
    pub require_identifying_field: bool,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            token_overlap_min: default_overlap_min(),
            token_overlap_bonus: default_overlap_bonus(),
            min_partial_id_digits: default_partial_digits(),
            require_identifying_field: true,
        }
    }
}

fn default_overlap_min() -> f64 {
    0.5
}

fn default_overlap_bonus() -> f64 {
    0.1
}

fn default_partial_digits() -> usize {
    4
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingMode {
    /// Score every pair.
    Exhaustive,
    /// Score only pairs sharing a block key.
    Blocked,
    /// Exhaustive up to `auto_threshold` records, blocked above.
    Auto,
}

impl std::fmt::Display for BlockingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhaustive => write!(f, "exhaustive"),
            Self::Blocked => write!(f, "blocked"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKey {
    /// Zip5 + first letter of the surname (or business name).
    ZipInitial,
    /// First six phone digits.
    PhonePrefix,
    SsnLast4,
    Ein,
    Email,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockingConfig {
    #[serde(default = "default_blocking_mode")]
    pub mode: BlockingMode,
    #[serde(default = "default_auto_threshold")]
    pub auto_threshold: usize,
    #[serde(default = "default_block_keys")]
    pub keys: Vec<BlockKey>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            mode: default_blocking_mode(),
            auto_threshold: default_auto_threshold(),
            keys: default_block_keys(),
        }
    }
}

impl BlockingConfig {
    /// The mode actually applied to a batch of `record_count` records.
    pub fn effective_mode(&self, record_count: usize) -> BlockingMode {
        match self.mode {
            BlockingMode::Auto if record_count > self.auto_threshold => BlockingMode::Blocked,
            BlockingMode::Auto => BlockingMode::Exhaustive,
            other => other,
        }
    }
}

fn default_blocking_mode() -> BlockingMode {
    BlockingMode::Auto
}

fn default_auto_threshold() -> usize {
    1000
}

fn default_block_keys() -> Vec<BlockKey> {
    vec![
        BlockKey::ZipInitial,
        BlockKey::PhonePrefix,
        BlockKey::SsnLast4,
        BlockKey::Ein,
        BlockKey::Email,
    ]
}

// ---------------------------------------------------------------------------
// Sources + run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Data sources, most authoritative first.
    #[serde(default = "default_authority")]
    pub authority: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
        }
    }
}

fn default_authority() -> Vec<String> {
    ["secretary_of_state", "state_registry", "county_assessor", "county_recorder"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl SourceConfig {
    /// Position in the authority list; unlisted sources share the lowest rank.
    pub fn rank(&self, source: Option<&str>) -> usize {
        source
            .and_then(|s| {
                self.authority
                    .iter()
                    .position(|a| a.eq_ignore_ascii_case(s.trim()))
            })
            .unwrap_or(self.authority.len())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Scoring threads. 0 uses the shared rayon pool.
    #[serde(default)]
    pub workers: usize,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ResolveConfig {
    pub fn from_toml(input: &str) -> Result<Self, ResolveError> {
        let config: ResolveConfig =
            toml::from_str(input).map_err(|e| ResolveError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        for field in MatchField::ALL {
            let weight = self.weights.get(&field).ok_or_else(|| {
                ResolveError::Configuration(format!("weights: missing required key '{field}'"))
            })?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ResolveError::Configuration(format!(
                    "weights: '{field}' must be a finite non-negative number, got {weight}"
                )));
            }
        }
        if self.weights.values().all(|w| *w == 0.0) {
            return Err(ResolveError::Configuration(
                "weights: at least one weight must be positive".into(),
            ));
        }

        let t = &self.thresholds;
        for (label, value) in [("exact", t.exact), ("high", t.high), ("medium", t.medium), ("low", t.low)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ResolveError::Configuration(format!(
                    "thresholds: '{label}' must be within [0, 1], got {value}"
                )));
            }
        }
        if !(t.exact >= t.high && t.high >= t.medium && t.medium >= t.low) {
            return Err(ResolveError::Configuration(format!(
                "thresholds must be ordered exact >= high >= medium >= low, got {} / {} / {} / {}",
                t.exact, t.high, t.medium, t.low
            )));
        }

        if !(self.merge_threshold > 0.0 && self.merge_threshold <= 1.0) {
            return Err(ResolveError::Configuration(format!(
                "merge_threshold must be within (0, 1], got {}",
                self.merge_threshold
            )));
        }

        let f = &self.fuzzy;
        if !(0.0..=1.0).contains(&f.token_overlap_min) || !(0.0..=1.0).contains(&f.token_overlap_bonus) {
            return Err(ResolveError::Configuration(
                "fuzzy: token_overlap_min and token_overlap_bonus must be within [0, 1]".into(),
            ));
        }
        if f.min_partial_id_digits == 0 {
            return Err(ResolveError::Configuration(
                "fuzzy: min_partial_id_digits must be at least 1".into(),
            ));
        }

        if self.blocking.mode != BlockingMode::Exhaustive && self.blocking.keys.is_empty() {
            return Err(ResolveError::Configuration(format!(
                "blocking: mode '{}' requires at least one key",
                self.blocking.mode
            )));
        }

        Ok(())
    }

    pub fn weight(&self, field: MatchField) -> f64 {
        self.weights.get(&field).copied().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
