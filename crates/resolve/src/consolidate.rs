//! Folds each cluster into one canonical owner profile.
//!
//! Every choice here is a pure function of the cluster's members and the
//! source authority list. Ties fall through to value order and finally input
//! position, never to hash or iteration order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::SourceConfig;
use crate::model::{AddressEntry, NormalizedRecord, OwnerCluster, OwnerProfile, OwnerRecord};

struct Member<'r> {
    norm: &'r NormalizedRecord,
    raw: &'r OwnerRecord,
    rank: usize,
}

/// `originals` is the full input batch, indexed by `NormalizedRecord::index`.
pub fn build_profiles(
    clusters: &[OwnerCluster],
    normalized: &[NormalizedRecord],
    originals: &[OwnerRecord],
    sources: &SourceConfig,
) -> Vec<OwnerProfile> {
    clusters
        .iter()
        .map(|cluster| build_profile(cluster, normalized, originals, sources))
        .collect()
}

pub fn build_profile(
    cluster: &OwnerCluster,
    normalized: &[NormalizedRecord],
    originals: &[OwnerRecord],
    sources: &SourceConfig,
) -> OwnerProfile {
    let members: Vec<Member> = cluster
        .members
        .iter()
        .map(|&pos| {
            let norm = &normalized[pos];
            Member {
                norm,
                raw: &originals[norm.index],
                rank: sources.rank(norm.data_source.as_deref()),
            }
        })
        .collect();

    let canonical_name = pick_canonical(&members, |m| m.norm.name.as_ref().and(m.raw.name.as_deref()));
    let canonical_business_name = pick_canonical(&members, |m| {
        m.norm.business_name.as_ref().and(m.raw.business_name.as_deref())
    });

    let addresses = consolidate_addresses(&members);
    let primary_address = addresses.iter().find(|a| a.primary).map(|a| a.display.clone());

    OwnerProfile {
        cluster_id: cluster.cluster_id.clone(),
        canonical_name,
        canonical_business_name,
        business_type: pick_business_type(&members),
        primary_address,
        addresses,
        properties: union_properties(&members),
        emails: members
            .iter()
            .filter_map(|m| m.norm.email.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        phones: members
            .iter()
            .filter_map(|m| m.norm.phone.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        sources: cluster.sources.iter().cloned().collect(),
        record_ids: cluster.record_ids.clone(),
        confidence: cluster.confidence,
        tier: cluster.tier,
    }
}

/// Highest authority, then longest value, then smallest value, then input position.
fn pick_canonical<'r, F>(members: &[Member<'r>], value: F) -> Option<String>
where
    F: Fn(&Member<'r>) -> Option<&'r str>,
{
    members
        .iter()
        .filter_map(|m| value(m).map(str::trim).filter(|v| !v.is_empty()).map(|v| (m, v)))
        .min_by(|(a, va), (b, vb)| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| vb.chars().count().cmp(&va.chars().count()))
                .then_with(|| va.cmp(vb))
                .then_with(|| a.norm.index.cmp(&b.norm.index))
        })
        .map(|(_, v)| v.to_string())
}

fn by_authority(a: &Member, b: &Member) -> Ordering {
    a.rank.cmp(&b.rank).then_with(|| a.norm.index.cmp(&b.norm.index))
}

fn pick_business_type(members: &[Member]) -> crate::model::BusinessType {
    members
        .iter()
        .filter(|m| m.norm.business_type_explicit)
        .min_by(|a, b| by_authority(a, b))
        .or_else(|| members.iter().min_by(|a, b| by_authority(a, b)))
        .map(|m| m.norm.business_type.clone())
        .unwrap_or(crate::model::BusinessType::Individual)
}

/// Distinct comparable addresses; the most frequent is primary, ties go to
/// the best source carrying it, then to normalized text order.
fn consolidate_addresses(members: &[Member]) -> Vec<AddressEntry> {
    struct Tally<'m, 'r> {
        occurrences: usize,
        best: &'m Member<'r>,
    }

    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for m in members {
        let Some(addr) = m.norm.address.as_ref().filter(|a| a.is_comparable()) else {
            continue;
        };
        tallies
            .entry(addr.full.as_str())
            .and_modify(|t| {
                t.occurrences += 1;
                if by_authority(m, t.best) == Ordering::Less {
                    t.best = m;
                }
            })
            .or_insert(Tally { occurrences: 1, best: m });
    }

    let mut entries: Vec<(&str, Tally)> = tallies.into_iter().collect();
    entries.sort_by(|(na, a), (nb, b)| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.best.rank.cmp(&b.best.rank))
            .then_with(|| na.cmp(nb))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (normalized, tally))| AddressEntry {
            normalized: normalized.to_string(),
            display: display_address(tally.best.raw),
            occurrences: tally.occurrences,
            primary: i == 0,
        })
        .collect()
}

/// "123 Main Street, Los Angeles, CA 90210" from the record's own spelling.
fn display_address(raw: &OwnerRecord) -> String {
    let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let state_zip = [trimmed(&raw.state), trimmed(&raw.zip_code)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    [trimmed(&raw.address), trimmed(&raw.city), Some(state_zip).filter(|s| !s.is_empty())]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every member's property ids, first occurrence kept, member order preserved.
fn union_properties(members: &[Member]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in members {
        for id in &m.raw.properties {
            let id = id.trim();
            if !id.is_empty() && seen.insert(id.to_string()) {
                out.push(id.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::build_clusters;
    use crate::config::TierThresholds;
    use crate::model::BusinessType;
    use crate::normalize::normalize_record;

    fn profile_of(records: &[OwnerRecord]) -> OwnerProfile {
        let normalized: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(i, r)| normalize_record(r, i).unwrap())
            .collect();
        let mut clusters = build_clusters(&normalized, Vec::new(), &TierThresholds::default());
        // Collapse everything into one cluster for consolidation tests.
        let mut all = clusters.remove(0);
        for c in clusters {
            all.members.extend(c.members);
            all.record_ids.extend(c.record_ids);
            all.sources.extend(c.sources);
        }
        build_profile(&all, &normalized, records, &SourceConfig::default())
    }

    fn located(name: &str, source: &str, street: &str) -> OwnerRecord {
        OwnerRecord {
            data_source: Some(source.into()),
            address: Some(street.into()),
            city: Some("Austin".into()),
            state: Some("TX".into()),
            zip_code: Some("78701".into()),
            ..OwnerRecord::named(name)
        }
    }

    #[test]
    fn authority_beats_length() {
        let p = profile_of(&[
            located("Jonathan Q. Smithington", "listing_site", "1 Oak St"),
            located("J. Smith", "secretary_of_state", "1 Oak St"),
        ]);
        assert_eq!(p.canonical_name.as_deref(), Some("J. Smith"));
    }

    #[test]
    fn length_breaks_authority_tie() {
        let p = profile_of(&[
            located("John Smith", "county_assessor", "1 Oak St"),
            located("John Albert Smith", "county_assessor", "1 Oak St"),
        ]);
        assert_eq!(p.canonical_name.as_deref(), Some("John Albert Smith"));
    }

    #[test]
    fn most_frequent_address_is_primary() {
        let p = profile_of(&[
            located("John Smith", "secretary_of_state", "9 Elm Street"),
            located("John Smith", "listing_site", "1 Oak St"),
            located("John Smith", "listing_site", "1 Oak Street Apt 2"),
        ]);
        assert_eq!(p.addresses.len(), 2);
        assert!(p.addresses[0].primary);
        assert_eq!(p.addresses[0].normalized, "1 oak st austin tx 78701");
        assert_eq!(p.addresses[0].occurrences, 2);
        assert_eq!(p.primary_address.as_deref(), Some("1 Oak St, Austin, TX 78701"));
        assert!(!p.addresses[1].primary);
    }

    #[test]
    fn address_tie_goes_to_authority() {
        let p = profile_of(&[
            located("John Smith", "listing_site", "1 Oak St"),
            located("John Smith", "county_assessor", "9 Elm St"),
        ]);
        assert_eq!(p.primary_address.as_deref(), Some("9 Elm St, Austin, TX 78701"));
    }

    #[test]
    fn properties_union_without_loss() {
        let a = OwnerRecord {
            properties: vec!["APN-1".into(), "APN-2".into()],
            ..OwnerRecord::named("John Smith")
        };
        let b = OwnerRecord {
            properties: vec![" APN-2 ".into(), "APN-3".into(), "".into()],
            ..OwnerRecord::named("John Smith")
        };
        let p = profile_of(&[a, b]);
        assert_eq!(p.properties, vec!["APN-1", "APN-2", "APN-3"]);
    }

    #[test]
    fn explicit_business_type_wins() {
        let a = OwnerRecord {
            data_source: Some("secretary_of_state".into()),
            ..OwnerRecord::business("Smith Holdings")
        };
        let b = OwnerRecord {
            business_type: Some(BusinessType::Llc),
            data_source: Some("listing_site".into()),
            ..OwnerRecord::business("Smith Holdings LLC")
        };
        let p = profile_of(&[a, b]);
        assert_eq!(p.business_type, BusinessType::Llc);
        assert_eq!(p.canonical_business_name.as_deref(), Some("Smith Holdings"));
        assert!(p.canonical_name.is_none());
    }
}
