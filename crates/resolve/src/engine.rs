use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::blocking::{candidate_pairs, CandidatePairs};
use crate::cluster::{build_clusters, Edge};
use crate::config::ResolveConfig;
use crate::consolidate::build_profiles;
use crate::error::ResolveError;
use crate::model::{
    MalformedRecord, NormalizedRecord, OwnerRecord, ResolveMeta, ResolveResult, RunStage, ScoringFailure,
    SimilarityScore,
};
use crate::normalize::{normalize_record, record_id};
use crate::report::compute_report;
use crate::scorer::PairwiseScorer;

pub const ALGORITHM: &str = "weighted-fuzzy-union-find";

/// Pairs handed to one rayon task in blocked mode.
const SCORE_CHUNK: usize = 256;

/// Cooperative cancellation, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One resolution run over a batch: normalize, score, cluster, consolidate, report.
pub struct Resolver {
    config: ResolveConfig,
    cancel: CancelToken,
}

impl Resolver {
    pub fn new(config: ResolveConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn run(&self, records: &[OwnerRecord]) -> Result<ResolveResult, ResolveError> {
        let config = &self.config;
        config.validate()?;
        log::info!("resolve '{}': {} input records", config.name, records.len());

        self.enter(RunStage::Normalizing)?;
        let (normalized, malformed) = normalize_batch(records);

        self.enter(RunStage::Scoring)?;
        let pairs = candidate_pairs(&normalized, &config.blocking);
        let (edges, scoring_failures) = self.score(&normalized, &pairs)?;

        self.enter(RunStage::Clustering)?;
        let clusters = build_clusters(&normalized, edges, &config.thresholds);

        self.enter(RunStage::Consolidating)?;
        let profiles = build_profiles(&clusters, &normalized, records, &config.sources);

        self.enter(RunStage::Reporting)?;
        let report = compute_report(records.len(), &clusters, malformed, scoring_failures);

        log::debug!("stage: {}", RunStage::Done);
        log::info!(
            "resolve '{}': {} records -> {} owners ({} duplicates, {} malformed, {} scoring failures)",
            config.name,
            report.original_count,
            report.unique_count,
            report.duplicates_found,
            report.malformed_count,
            report.scoring_failures.len()
        );

        Ok(ResolveResult {
            meta: ResolveMeta {
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                algorithm: ALGORITHM.to_string(),
                config_name: config.name.clone(),
                merge_threshold: config.merge_threshold,
                thresholds: config.thresholds.clone(),
                weights: config.weights.clone(),
                blocking_mode: pairs.mode(),
                candidate_pairs: pairs.len(),
            },
            profiles,
            report,
        })
    }

    /// Field-level score for two records of a batch, looked up by record id.
    pub fn explain(
        &self,
        records: &[OwnerRecord],
        left_id: &str,
        right_id: &str,
    ) -> Result<SimilarityScore, ResolveError> {
        self.config.validate()?;
        let find = |wanted: &str| -> Result<NormalizedRecord, ResolveError> {
            let index = records
                .iter()
                .enumerate()
                .position(|(i, r)| record_id(r, i) == wanted)
                .ok_or_else(|| ResolveError::UnknownRecord(wanted.to_string()))?;
            normalize_record(&records[index], index)
        };
        let (left, right) = (find(left_id)?, find(right_id)?);
        PairwiseScorer::new(&self.config).score(&left, &right)
    }

    fn enter(&self, stage: RunStage) -> Result<(), ResolveError> {
        if self.cancel.is_cancelled() {
            log::info!("resolve '{}': cancelled before {stage}", self.config.name);
            return Err(ResolveError::Cancelled { stage });
        }
        log::debug!("stage: {stage}");
        Ok(())
    }

    fn score(
        &self,
        normalized: &[NormalizedRecord],
        pairs: &CandidatePairs,
    ) -> Result<(Vec<Edge>, Vec<ScoringFailure>), ResolveError> {
        let outcomes = if self.config.run.workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.run.workers)
                .build()
                .map_err(|e| ResolveError::WorkerPool(e.to_string()))?;
            pool.install(|| score_pairs(normalized, pairs, &self.config))
        } else {
            score_pairs(normalized, pairs, &self.config)
        };

        let mut edges = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(edge) => edges.push(edge),
                Err(ResolveError::InternalScoring { left, right, field, reason }) => {
                    log::warn!("scoring {left} vs {right} failed on {field}: {reason}; treated as no match");
                    failures.push(ScoringFailure { left, right, field, reason });
                }
                Err(other) => return Err(other),
            }
        }
        log::debug!(
            "scoring: {} candidate pairs, {} edges at or above {}",
            pairs.len(),
            edges.len(),
            self.config.merge_threshold
        );
        Ok((edges, failures))
    }
}

/// Normalize every record; malformed and duplicate-id records are set aside.
fn normalize_batch(records: &[OwnerRecord]) -> (Vec<NormalizedRecord>, Vec<MalformedRecord>) {
    let mut normalized = Vec::with_capacity(records.len());
    let mut malformed = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let rejected = match normalize_record(record, index) {
            Ok(norm) if !seen_ids.insert(norm.id.clone()) => MalformedRecord {
                index,
                record_id: norm.id,
                field: "id".into(),
                reason: "duplicate record id".into(),
            },
            Ok(norm) => {
                normalized.push(norm);
                continue;
            }
            Err(ResolveError::MalformedRecord { index, record_id, field, reason }) => MalformedRecord {
                index,
                record_id,
                field,
                reason,
            },
            Err(other) => MalformedRecord {
                index,
                record_id: record_id(record, index),
                field: "record".into(),
                reason: other.to_string(),
            },
        };
        log::warn!(
            "record {} (index {}) excluded: {}: {}",
            rejected.record_id,
            rejected.index,
            rejected.field,
            rejected.reason
        );
        malformed.push(rejected);
    }

    (normalized, malformed)
}

/// Score candidates in parallel. Each task returns its own list; lists are
/// joined in task order, so output order never depends on scheduling.
fn score_pairs(
    normalized: &[NormalizedRecord],
    pairs: &CandidatePairs,
    config: &ResolveConfig,
) -> Vec<Result<Edge, ResolveError>> {
    let scorer = PairwiseScorer::new(config);
    let evaluate = |i: usize, j: usize| -> Option<Result<Edge, ResolveError>> {
        match scorer.score(&normalized[i], &normalized[j]) {
            Ok(score) if score.composite >= config.merge_threshold => Some(Ok(Edge { left: i, right: j, score })),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    };

    let chunks: Vec<Vec<Result<Edge, ResolveError>>> = match pairs {
        CandidatePairs::Exhaustive { count } => (0..*count)
            .into_par_iter()
            .map(|i| (i + 1..*count).filter_map(|j| evaluate(i, j)).collect())
            .collect(),
        CandidatePairs::Blocked(list) => list
            .par_chunks(SCORE_CHUNK)
            .map(|chunk| chunk.iter().filter_map(|&(i, j)| evaluate(i, j)).collect())
            .collect(),
    };
    chunks.into_iter().flatten().collect()
}

/// Resolve a batch with default cancellation.
pub fn batch_deduplication(records: &[OwnerRecord], config: &ResolveConfig) -> Result<ResolveResult, ResolveError> {
    Resolver::new(config.clone()).run(records)
}

/// Score two standalone records against each other.
pub fn score_records(
    a: &OwnerRecord,
    b: &OwnerRecord,
    config: &ResolveConfig,
) -> Result<SimilarityScore, ResolveError> {
    config.validate()?;
    let left = normalize_record(a, 0)?;
    let right = normalize_record(b, 1)?;
    PairwiseScorer::new(config).score(&left, &right)
}
