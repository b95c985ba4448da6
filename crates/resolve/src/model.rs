use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{BlockingMode, TierThresholds};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One source's observation of a property owner.
///
/// Only `name` or `business_name` is required; every other field is optional
/// because upstream data is dirty. Validation happens once, in the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "business_name")]
    pub business_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "zip", alias = "zip_code")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub ein: Option<String>,
    #[serde(default, alias = "date_of_birth", alias = "dob")]
    pub date_of_birth: Option<String>,
    #[serde(default, alias = "business_type")]
    pub business_type: Option<BusinessType>,
    #[serde(default, alias = "data_source", alias = "source")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl OwnerRecord {
    /// A record for a natural person.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A record for a business entity.
    pub fn business(business_name: impl Into<String>) -> Self {
        Self {
            business_name: Some(business_name.into()),
            ..Self::default()
        }
    }
}

/// Legal form of the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BusinessType {
    Individual,
    Llc,
    Corporation,
    Trust,
    Partnership,
    Other(String),
}

impl From<String> for BusinessType {
    fn from(raw: String) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "individual" | "person" | "natural" | "naturalperson" => Self::Individual,
            "llc" | "limitedliabilitycompany" => Self::Llc,
            "corporation" | "corp" | "inc" | "incorporated" => Self::Corporation,
            "trust" => Self::Trust,
            "partnership" | "lp" | "llp" => Self::Partnership,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

impl From<BusinessType> for String {
    fn from(value: BusinessType) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "Individual"),
            Self::Llc => write!(f, "LLC"),
            Self::Corporation => write!(f, "Corporation"),
            Self::Trust => write!(f, "Trust"),
            Self::Partnership => write!(f, "Partnership"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized (per-run, never persisted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedName {
    /// Core tokens followed by suffix tokens, space separated.
    pub full: String,
    pub tokens: BTreeSet<String>,
    pub suffixes: Vec<String>,
}

impl NormalizedName {
    /// Last core token: the surname for people, usually the last word for businesses.
    pub fn surname(&self) -> Option<&str> {
        self.full
            .split(' ')
            .filter(|t| !self.suffixes.iter().any(|s| s == t))
            .last()
    }

    pub fn first_token(&self) -> Option<&str> {
        self.full.split(' ').find(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    /// Every present part joined; the string fuzzy comparison runs on.
    pub full: String,
    pub tokens: BTreeSet<String>,
}

impl NormalizedAddress {
    /// Without a street line an address only feeds blocking, never scoring.
    pub fn is_comparable(&self) -> bool {
        self.street.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BirthDate {
    Parsed(NaiveDate),
    /// Present in the source but not in any accepted date format.
    Unparsed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub index: usize,
    pub id: String,
    pub data_source: Option<String>,
    pub name: Option<NormalizedName>,
    pub business_name: Option<NormalizedName>,
    pub address: Option<NormalizedAddress>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub ssn: Option<String>,
    pub ein: Option<String>,
    pub date_of_birth: Option<BirthDate>,
    pub business_type: BusinessType,
    /// False when `business_type` was inferred rather than supplied.
    pub business_type_explicit: bool,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Fields that take part in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Ssn,
    Ein,
    DateOfBirth,
    Email,
    Phone,
    BusinessName,
    Name,
    Address,
}

impl MatchField {
    pub const ALL: [MatchField; 8] = [
        Self::Ssn,
        Self::Ein,
        Self::DateOfBirth,
        Self::Email,
        Self::Phone,
        Self::BusinessName,
        Self::Name,
        Self::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssn => "ssn",
            Self::Ein => "ein",
            Self::DateOfBirth => "date_of_birth",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::BusinessName => "business_name",
            Self::Name => "name",
            Self::Address => "address",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }

    /// Address is supporting evidence; everything else can identify an owner.
    pub fn is_identifying(&self) -> bool {
        !matches!(self, Self::Address)
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Exact,
    High,
    Medium,
    Low,
    NoMatch,
}

impl ConfidenceTier {
    pub const ALL: [ConfidenceTier; 5] = [
        Self::Exact,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::NoMatch,
    ];
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldContribution {
    pub field: MatchField,
    pub similarity: f64,
    pub weight: f64,
    /// `weight * similarity`, before division by the overlapping weight total.
    pub contribution: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub token_bonus: bool,
}

/// Composite similarity of two records plus its field-level basis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub left: String,
    pub right: String,
    pub composite: f64,
    pub tier: ConfidenceTier,
    pub fields: Vec<FieldContribution>,
}

// ---------------------------------------------------------------------------
// Clusters + profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OwnerCluster {
    pub cluster_id: String,
    /// Positions in the run's normalized record slice, ascending.
    #[serde(skip)]
    pub members: Vec<usize>,
    pub record_ids: Vec<String>,
    /// Lowest composite among the matched pairs inside the cluster.
    /// `None` for a singleton.
    pub min_score: Option<f64>,
    pub confidence: f64,
    pub tier: ConfidenceTier,
    pub sources: BTreeSet<String>,
    pub edges: Vec<SimilarityScore>,
}

impl OwnerCluster {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressEntry {
    pub normalized: String,
    pub display: String,
    pub occurrences: usize,
    pub primary: bool,
}

/// Canonical view of one real-world owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerProfile {
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_business_name: Option<String>,
    pub business_type: BusinessType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_address: Option<String>,
    pub addresses: Vec<AddressEntry>,
    pub properties: Vec<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub sources: Vec<String>,
    pub record_ids: Vec<String>,
    pub confidence: f64,
    pub tier: ConfidenceTier,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    pub index: usize,
    pub record_id: String,
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringFailure {
    pub left: String,
    pub right: String,
    pub field: MatchField,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterTrace {
    pub cluster_id: String,
    pub record_ids: Vec<String>,
    pub min_score: Option<f64>,
    pub tier: ConfidenceTier,
    pub matches: Vec<SimilarityScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    pub original_count: usize,
    pub malformed_count: usize,
    pub clustered_count: usize,
    pub unique_count: usize,
    pub duplicates_found: usize,
    /// Percentage of clustered records folded into another record.
    pub deduplication_rate: f64,
    pub singleton_clusters: usize,
    pub merged_clusters: usize,
    pub tier_distribution: BTreeMap<String, usize>,
    pub cluster_traces: Vec<ClusterTrace>,
    pub malformed_records: Vec<MalformedRecord>,
    pub scoring_failures: Vec<ScoringFailure>,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResolveMeta {
    pub engine_version: String,
    pub algorithm: String,
    pub config_name: String,
    pub merge_threshold: f64,
    pub thresholds: TierThresholds,
    pub weights: BTreeMap<MatchField, f64>,
    pub blocking_mode: BlockingMode,
    pub candidate_pairs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub meta: ResolveMeta,
    pub profiles: Vec<OwnerProfile>,
    pub report: ConsolidationReport,
}

/// Stages of one resolution run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Pending,
    Normalizing,
    Scoring,
    Clustering,
    Consolidating,
    Reporting,
    Done,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Normalizing => write!(f, "normalizing"),
            Self::Scoring => write!(f, "scoring"),
            Self::Clustering => write!(f, "clustering"),
            Self::Consolidating => write!(f, "consolidating"),
            Self::Reporting => write!(f, "reporting"),
            Self::Done => write!(f, "done"),
        }
    }
}
