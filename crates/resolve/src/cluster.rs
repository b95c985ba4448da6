use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

use crate::config::TierThresholds;
use crate::model::{NormalizedRecord, OwnerCluster, SimilarityScore};

/// A scored pair at or above the merge threshold.
/// `left` / `right` are positions in the normalized slice, `left < right`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub left: usize,
    pub right: usize,
    pub score: SimilarityScore,
}

/// Disjoint sets with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Returns false when `a` and `b` were already connected.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Connected components of the match graph, as owner clusters.
///
/// Membership is transitive: A~B and B~C put A, B and C together even when
/// A and C alone fall below the threshold. Clusters come out ordered by their
/// first member; members ascend.
pub fn build_clusters(records: &[NormalizedRecord], edges: Vec<Edge>, thresholds: &TierThresholds) -> Vec<OwnerCluster> {
    let mut uf = UnionFind::new(records.len());
    for edge in &edges {
        uf.union(edge.left, edge.right);
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<(Vec<usize>, Vec<SimilarityScore>)> = Vec::new();
    for pos in 0..records.len() {
        let root = uf.find(pos);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push((Vec::new(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].0.push(pos);
    }
    for edge in edges {
        let slot = slot_of_root[&uf.find(edge.left)];
        groups[slot].1.push(edge.score);
    }

    groups
        .into_iter()
        .map(|(members, edges)| {
            let record_ids: Vec<String> = members.iter().map(|&p| records[p].id.clone()).collect();
            let sources: BTreeSet<String> = members
                .iter()
                .filter_map(|&p| records[p].data_source.clone())
                .collect();
            let min_score = edges.iter().map(|e| e.composite).reduce(f64::min);
            let confidence = min_score.unwrap_or(1.0);

            OwnerCluster {
                cluster_id: cluster_fingerprint(&record_ids),
                members,
                record_ids,
                min_score,
                confidence,
                tier: thresholds.tier_for(confidence),
                sources,
                edges,
            }
        })
        .collect()
}

/// Stable id derived from the sorted member ids: `own_<16 hex>`.
pub fn cluster_fingerprint(record_ids: &[String]) -> String {
    let mut ids: Vec<&str> = record_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let hex = format!("{:x}", hasher.finalize());
    format!("own_{}", &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceTier, OwnerRecord};
    use crate::normalize::normalize_record;

    fn records(n: usize) -> Vec<NormalizedRecord> {
        (0..n)
            .map(|i| {
                let record = OwnerRecord {
                    data_source: Some(format!("src_{}", i % 2)),
                    ..OwnerRecord::named(format!("Owner {i}"))
                };
                normalize_record(&record, i).unwrap()
            })
            .collect()
    }

    fn edge(records: &[NormalizedRecord], left: usize, right: usize, composite: f64) -> Edge {
        Edge {
            left,
            right,
            score: SimilarityScore {
                left: records[left].id.clone(),
                right: records[right].id.clone(),
                composite,
                tier: TierThresholds::default().tier_for(composite),
                fields: Vec::new(),
            },
        }
    }

    #[test]
    fn union_find_connects_transitively() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(1, 2));
        assert!(!uf.union(0, 2));
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn chain_forms_one_cluster() {
        let recs = records(4);
        let edges = vec![edge(&recs, 0, 1, 0.9), edge(&recs, 1, 2, 0.75)];
        let clusters = build_clusters(&recs, edges, &TierThresholds::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
        assert_eq!(clusters[0].min_score, Some(0.75));
        assert_eq!(clusters[0].tier, ConfidenceTier::Medium);
        assert_eq!(clusters[0].edges.len(), 2);
        assert_eq!(clusters[0].sources.len(), 2);
        assert_eq!(clusters[1].members, vec![3]);
        assert!(clusters[1].is_singleton());
    }

    #[test]
    fn singleton_is_self_match() {
        let recs = records(1);
        let clusters = build_clusters(&recs, Vec::new(), &TierThresholds::default());
        assert_eq!(clusters[0].min_score, None);
        assert_eq!(clusters[0].confidence, 1.0);
        assert_eq!(clusters[0].tier, ConfidenceTier::Exact);
    }

    #[test]
    fn cluster_order_follows_first_member() {
        let recs = records(5);
        let edges = vec![edge(&recs, 3, 4, 0.8), edge(&recs, 1, 2, 0.8)];
        let clusters = build_clusters(&recs, edges, &TierThresholds::default());
        let firsts: Vec<usize> = clusters.iter().map(|c| c.members[0]).collect();
        assert_eq!(firsts, vec![0, 1, 3]);
    }

    #[test]
    fn fingerprint_ignores_member_order() {
        let a = cluster_fingerprint(&["b".to_string(), "a".to_string()]);
        let b = cluster_fingerprint(&["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
        assert!(a.starts_with("own_"));
        assert_eq!(a.len(), 20);
        assert_ne!(a, cluster_fingerprint(&["a".to_string()]));
    }
}
