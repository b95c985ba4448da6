use std::collections::BTreeSet;

use crate::config::{FuzzyConfig, ResolveConfig};
use crate::error::ResolveError;
use crate::model::{BirthDate, FieldContribution, MatchField, NormalizedName, NormalizedRecord, SimilarityScore};

/// Weighted multi-field comparison of two normalized records.
///
/// The composite is a weighted average over the fields present on *both*
/// sides, so a source that never captured a field is not penalized for it.
pub struct PairwiseScorer<'a> {
    config: &'a ResolveConfig,
}

/// Per-field outcome: similarity in [0, 1] and whether the token bonus applied.
type FieldOutcome = Option<(f64, bool)>;

impl<'a> PairwiseScorer<'a> {
    pub fn new(config: &'a ResolveConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> Result<SimilarityScore, ResolveError> {
        // Canonical orientation keeps ids stable regardless of call order.
        let (left, right) = if a.index <= b.index { (a, b) } else { (b, a) };

        let mut fields = Vec::new();
        let mut weight_total = 0.0;
        let mut weighted_sum = 0.0;
        let mut identifying_overlap = false;

        for field in MatchField::ALL {
            let Some((similarity, token_bonus)) = self.compare_field(field, left, right)? else {
                continue;
            };
            let weight = self.config.weight(field);
            let contribution = weight * similarity;
            weight_total += weight;
            weighted_sum += contribution;
            if field.is_identifying() && weight > 0.0 {
                identifying_overlap = true;
            }
            fields.push(FieldContribution {
                field,
                similarity,
                weight,
                contribution,
                token_bonus,
            });
        }

        let supporting_only = self.config.fuzzy.require_identifying_field && !identifying_overlap;
        let composite = if weight_total <= 0.0 || supporting_only {
            0.0
        } else {
            (weighted_sum / weight_total).clamp(0.0, 1.0)
        };

        Ok(SimilarityScore {
            left: left.id.clone(),
            right: right.id.clone(),
            composite,
            tier: self.config.thresholds.tier_for(composite),
            fields,
        })
    }

    fn compare_field(
        &self,
        field: MatchField,
        a: &NormalizedRecord,
        b: &NormalizedRecord,
    ) -> Result<FieldOutcome, ResolveError> {
        let fuzzy = &self.config.fuzzy;
        let outcome = match field {
            MatchField::Ssn => match both(&a.ssn, &b.ssn) {
                Some((x, y)) => {
                    check_digits(field, a, b, x, y)?;
                    Some((id_similarity(x, y, fuzzy.min_partial_id_digits), false))
                }
                None => None,
            },
            MatchField::Ein => match both(&a.ein, &b.ein) {
                Some((x, y)) => {
                    check_digits(field, a, b, x, y)?;
                    Some((id_similarity(x, y, fuzzy.min_partial_id_digits), false))
                }
                None => None,
            },
            MatchField::Email => both(&a.email, &b.email).map(|(x, y)| (exact(x, y), false)),
            MatchField::Phone => match both(&a.phone, &b.phone) {
                Some((x, y)) => {
                    check_digits(field, a, b, x, y)?;
                    Some((exact(x, y), false))
                }
                None => None,
            },
            MatchField::DateOfBirth => both(&a.date_of_birth, &b.date_of_birth).map(|(x, y)| {
                let same = match (x, y) {
                    (BirthDate::Parsed(x), BirthDate::Parsed(y)) => x == y,
                    (BirthDate::Unparsed(x), BirthDate::Unparsed(y)) => x == y,
                    _ => false,
                };
                (if same { 1.0 } else { 0.0 }, false)
            }),
            MatchField::Name => both(&a.name, &b.name).map(|(x, y)| name_similarity(x, y, fuzzy)),
            MatchField::BusinessName => {
                both(&a.business_name, &b.business_name).map(|(x, y)| name_similarity(x, y, fuzzy))
            }
            MatchField::Address => match (&a.address, &b.address) {
                (Some(x), Some(y)) if x.is_comparable() && y.is_comparable() => {
                    Some(fuzzy_similarity(&x.full, &x.tokens, &y.full, &y.tokens, fuzzy))
                }
                _ => None,
            },
        };
        Ok(outcome)
    }
}

fn both<'r, T>(a: &'r Option<T>, b: &'r Option<T>) -> Option<(&'r T, &'r T)> {
    a.as_ref().zip(b.as_ref())
}

/// Normalized ids and phones are digit strings; anything else means the
/// record was built or altered outside the normalizer.
fn check_digits(
    field: MatchField,
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    x: &str,
    y: &str,
) -> Result<(), ResolveError> {
    for value in [x, y] {
        if value.is_empty() || !value.bytes().all(|c| c.is_ascii_digit()) {
            return Err(ResolveError::InternalScoring {
                left: a.id.clone(),
                right: b.id.clone(),
                field,
                reason: format!("normalized {field} '{value}' is not a digit string"),
            });
        }
    }
    Ok(())
}

fn exact(a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Identical, or one value is a suffix of the other (last-4 SSN and the like).
pub fn id_similarity(a: &str, b: &str, min_partial_digits: usize) -> f64 {
    if a == b {
        return 1.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.len() >= min_partial_digits && long.ends_with(short) {
        1.0
    } else {
        0.0
    }
}

fn name_similarity(a: &NormalizedName, b: &NormalizedName, fuzzy: &FuzzyConfig) -> (f64, bool) {
    fuzzy_similarity(&a.full, &a.tokens, &b.full, &b.tokens, fuzzy)
}

/// `1 - levenshtein / max_len`, plus a bounded bonus when token sets overlap.
pub fn fuzzy_similarity(
    a: &str,
    tokens_a: &BTreeSet<String>,
    b: &str,
    tokens_b: &BTreeSet<String>,
    fuzzy: &FuzzyConfig,
) -> (f64, bool) {
    let max_len = a.chars().count().max(b.chars().count());
    let base = if max_len == 0 {
        1.0
    } else {
        (1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64).clamp(0.0, 1.0)
    };

    let overlaps = token_overlap(tokens_a, tokens_b) >= fuzzy.token_overlap_min;
    if base < 1.0 && fuzzy.token_overlap_bonus > 0.0 && overlaps {
        ((base + fuzzy.token_overlap_bonus).min(1.0), true)
    } else {
        (base, false)
    }
}

/// Jaccard ratio of two token sets. Empty sets never overlap.
pub fn token_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
