use std::collections::{BTreeMap, BTreeSet};

use crate::config::{BlockKey, BlockingConfig, BlockingMode};
use crate::model::NormalizedRecord;

/// Pairs of positions (into the normalized slice) that will be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePairs {
    /// Every `i < j` over `count` records.
    Exhaustive { count: usize },
    /// Sorted, deduplicated `(i, j)` with `i < j`.
    Blocked(Vec<(usize, usize)>),
}

impl CandidatePairs {
    pub fn len(&self) -> usize {
        match self {
            Self::Exhaustive { count } => count * count.saturating_sub(1) / 2,
            Self::Blocked(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> BlockingMode {
        match self {
            Self::Exhaustive { .. } => BlockingMode::Exhaustive,
            Self::Blocked(_) => BlockingMode::Blocked,
        }
    }
}

/// Block keys for one record under the configured key kinds.
pub fn block_keys(record: &NormalizedRecord, kinds: &[BlockKey]) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for kind in kinds {
        let key = match kind {
            BlockKey::ZipInitial => {
                let zip = record.address.as_ref().and_then(|a| a.zip.as_deref());
                let initial = record
                    .name
                    .as_ref()
                    .and_then(|n| n.surname())
                    .or_else(|| record.business_name.as_ref().and_then(|n| n.first_token()))
                    .and_then(|t| t.chars().next());
                zip.zip(initial).map(|(z, c)| format!("zi:{z}:{c}"))
            }
            BlockKey::PhonePrefix => record
                .phone
                .as_deref()
                .filter(|p| p.len() >= 6)
                .map(|p| format!("ph:{}", &p[..6])),
            BlockKey::SsnLast4 => record
                .ssn
                .as_deref()
                .filter(|s| s.len() >= 4)
                .map(|s| format!("ss:{}", &s[s.len() - 4..])),
            BlockKey::Ein => record.ein.as_deref().map(|e| format!("ei:{e}")),
            BlockKey::Email => record.email.as_deref().map(|e| format!("em:{e}")),
        };
        if let Some(key) = key {
            keys.insert(key);
        }
    }
    keys
}

/// Decide which pairs get scored. Records sharing any block key are candidates.
pub fn candidate_pairs(records: &[NormalizedRecord], config: &BlockingConfig) -> CandidatePairs {
    if config.effective_mode(records.len()) == BlockingMode::Exhaustive {
        return CandidatePairs::Exhaustive { count: records.len() };
    }

    let mut blocks: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (pos, record) in records.iter().enumerate() {
        for key in block_keys(record, &config.keys) {
            blocks.entry(key).or_default().push(pos);
        }
    }

    let mut pairs = BTreeSet::new();
    for members in blocks.values() {
        for (n, &i) in members.iter().enumerate() {
            for &j in &members[n + 1..] {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }

    log::debug!(
        "blocking: {} records, {} blocks, {} candidate pairs",
        records.len(),
        blocks.len(),
        pairs.len()
    );

    CandidatePairs::Blocked(pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OwnerRecord;
    use crate::normalize::normalize_record;

    fn blocked() -> BlockingConfig {
        BlockingConfig {
            mode: BlockingMode::Blocked,
            ..BlockingConfig::default()
        }
    }

    fn rec(record: OwnerRecord, index: usize) -> NormalizedRecord {
        normalize_record(&record, index).unwrap()
    }

    #[test]
    fn keys_for_full_record() {
        let r = rec(
            OwnerRecord {
                zip_code: Some("90210".into()),
                phone: Some("310-555-0199".into()),
                ssn: Some("123-45-6789".into()),
                email: Some("j@x.example".into()),
                ..OwnerRecord::named("John Smith Jr.")
            },
            0,
        );
        let keys = block_keys(&r, &BlockingConfig::default().keys);
        assert!(keys.contains("zi:90210:s"));
        assert!(keys.contains("ph:310555"));
        assert!(keys.contains("ss:6789"));
        assert!(keys.contains("em:j@x.example"));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn business_uses_first_token_initial() {
        let r = rec(
            OwnerRecord {
                zip_code: Some("10001".into()),
                ..OwnerRecord::business("Harbor View Holdings LLC")
            },
            0,
        );
        let keys = block_keys(&r, &[BlockKey::ZipInitial]);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["zi:10001:h".to_string()]);
    }

    #[test]
    fn shared_key_makes_candidates() {
        let records = vec![
            rec(OwnerRecord { ssn: Some("1234".into()), ..OwnerRecord::named("John Smith") }, 0),
            rec(OwnerRecord { ssn: Some("999-00-1234".into()), ..OwnerRecord::named("J Smith") }, 1),
            rec(OwnerRecord { ssn: Some("5555".into()), ..OwnerRecord::named("Ann Lee") }, 2),
            rec(OwnerRecord { email: Some("ann@lee.example".into()), ..OwnerRecord::named("Ann Lee") }, 3),
        ];
        let pairs = candidate_pairs(&records, &blocked());
        assert_eq!(pairs, CandidatePairs::Blocked(vec![(0, 1)]));
        assert_eq!(pairs.mode(), BlockingMode::Blocked);
    }

    #[test]
    fn pairs_are_deduplicated_across_keys() {
        let base = OwnerRecord {
            ssn: Some("1234".into()),
            email: Some("a@b.example".into()),
            ..OwnerRecord::named("John Smith")
        };
        let records = vec![rec(base.clone(), 0), rec(base, 1)];
        let pairs = candidate_pairs(&records, &blocked());
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn exhaustive_counts_all_pairs() {
        let records: Vec<_> = (0..5).map(|i| rec(OwnerRecord::named(format!("Owner {i}")), i)).collect();
        let pairs = candidate_pairs(&records, &BlockingConfig::default());
        assert_eq!(pairs, CandidatePairs::Exhaustive { count: 5 });
        assert_eq!(pairs.len(), 10);
        assert!(!pairs.is_empty());
        assert!(CandidatePairs::Exhaustive { count: 1 }.is_empty());
    }
}
