use std::collections::BTreeMap;

use crate::model::{
    ClusterTrace, ConfidenceTier, ConsolidationReport, MalformedRecord, OwnerCluster, ScoringFailure,
};

/// Summarize a finished run.
///
/// `original_count` is the size of the input batch, including records that
/// were rejected as malformed and never reached clustering.
pub fn compute_report(
    original_count: usize,
    clusters: &[OwnerCluster],
    malformed_records: Vec<MalformedRecord>,
    scoring_failures: Vec<ScoringFailure>,
) -> ConsolidationReport {
    let mut tier_distribution: BTreeMap<String, usize> =
        ConfidenceTier::ALL.iter().map(|t| (t.to_string(), 0)).collect();
    let mut singleton_clusters = 0;
    let mut clustered_count = 0;

    for cluster in clusters {
        clustered_count += cluster.members.len();
        if cluster.is_singleton() {
            singleton_clusters += 1;
        } else {
            *tier_distribution.entry(cluster.tier.to_string()).or_insert(0) += 1;
        }
    }
    // Unmerged records carry no match evidence; keep them out of the tiers.
    tier_distribution.insert(SINGLETON_BUCKET.to_string(), singleton_clusters);

    let unique_count = clusters.len();
    let duplicates_found = clustered_count - unique_count;

    ConsolidationReport {
        original_count,
        malformed_count: malformed_records.len(),
        clustered_count,
        unique_count,
        duplicates_found,
        deduplication_rate: dedup_rate(duplicates_found, clustered_count),
        singleton_clusters,
        merged_clusters: unique_count - singleton_clusters,
        tier_distribution,
        cluster_traces: clusters.iter().map(trace).collect(),
        malformed_records,
        scoring_failures,
    }
}

/// `tier_distribution` key counting clusters of one record.
pub const SINGLETON_BUCKET: &str = "singleton";

/// Percentage with two decimals; an empty batch deduplicates nothing.
pub fn dedup_rate(duplicates: usize, clustered: usize) -> f64 {
    if clustered == 0 {
        return 0.0;
    }
    let pct = duplicates as f64 / clustered as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

fn trace(cluster: &OwnerCluster) -> ClusterTrace {
    ClusterTrace {
        cluster_id: cluster.cluster_id.clone(),
        record_ids: cluster.record_ids.clone(),
        min_score: cluster.min_score,
        tier: cluster.tier,
        matches: cluster.edges.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn cluster(members: Vec<usize>, tier: ConfidenceTier) -> OwnerCluster {
        OwnerCluster {
            cluster_id: format!("own_{}", members[0]),
            record_ids: members.iter().map(|m| format!("rec-{m}")).collect(),
            min_score: if members.len() > 1 { Some(0.9) } else { None },
            confidence: 0.9,
            tier,
            sources: BTreeSet::new(),
            edges: Vec::new(),
            members,
        }
    }

    #[test]
    fn three_records_two_owners() {
        let clusters = vec![cluster(vec![0, 1], ConfidenceTier::High), cluster(vec![2], ConfidenceTier::Exact)];
        let report = compute_report(3, &clusters, Vec::new(), Vec::new());
        assert_eq!(report.original_count, 3);
        assert_eq!(report.unique_count, 2);
        assert_eq!(report.duplicates_found, 1);
        assert_eq!(report.deduplication_rate, 33.33);
        assert_eq!(report.singleton_clusters, 1);
        assert_eq!(report.merged_clusters, 1);
        assert_eq!(report.tier_distribution["high"], 1);
        assert_eq!(report.tier_distribution["exact"], 0);
        assert_eq!(report.tier_distribution[SINGLETON_BUCKET], 1);
        assert_eq!(report.tier_distribution["no_match"], 0);
        assert_eq!(report.tier_distribution.len(), ConfidenceTier::ALL.len() + 1);
        assert_eq!(report.cluster_traces.len(), 2);
    }

    #[test]
    fn malformed_records_excluded_from_rate() {
        let malformed = vec![MalformedRecord {
            index: 2,
            record_id: "rec-0003".into(),
            field: "name".into(),
            reason: "missing".into(),
        }];
        let clusters = vec![cluster(vec![0, 1], ConfidenceTier::Exact)];
        let report = compute_report(3, &clusters, malformed, Vec::new());
        assert_eq!(report.malformed_count, 1);
        assert_eq!(report.clustered_count, 2);
        assert_eq!(report.duplicates_found, 1);
        assert_eq!(report.deduplication_rate, 50.0);
    }

    #[test]
    fn empty_batch() {
        let report = compute_report(0, &[], Vec::new(), Vec::new());
        assert_eq!(report.unique_count, 0);
        assert_eq!(report.deduplication_rate, 0.0);
        assert!(report.tier_distribution.values().all(|&n| n == 0));
    }
}
