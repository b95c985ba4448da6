//! Embedded sample batch used by the smoke check.

use serde::{Deserialize, Serialize};

use crate::config::ResolveConfig;
use crate::engine::batch_deduplication;
use crate::error::ResolveError;
use crate::model::{OwnerRecord, ResolveResult};

const SMOKE_FIXTURE: &str = include_str!("../fixtures/smoke_owners.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeExpectation {
    pub unique: usize,
    pub duplicates: usize,
}

#[derive(Debug, Deserialize)]
struct SmokeFixture {
    expected: SmokeExpectation,
    records: Vec<OwnerRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeOutcome {
    pub passed: bool,
    pub expected: SmokeExpectation,
    pub actual: SmokeExpectation,
    pub result: ResolveResult,
}

/// Resolve the embedded batch with default settings and compare counts.
pub fn smoke_test() -> Result<SmokeOutcome, ResolveError> {
    let fixture = load_fixture()?;
    let result = batch_deduplication(&fixture.records, &ResolveConfig::default())?;
    let actual = SmokeExpectation {
        unique: result.report.unique_count,
        duplicates: result.report.duplicates_found,
    };
    if actual != fixture.expected {
        log::warn!(
            "smoke check: expected {} unique / {} duplicates, got {} / {}",
            fixture.expected.unique,
            fixture.expected.duplicates,
            actual.unique,
            actual.duplicates
        );
    }
    Ok(SmokeOutcome {
        passed: actual == fixture.expected,
        expected: fixture.expected,
        actual,
        result,
    })
}

fn load_fixture() -> Result<SmokeFixture, ResolveError> {
    serde_json::from_str(SMOKE_FIXTURE).map_err(|e| ResolveError::InputParse(format!("smoke fixture: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_passes() {
        let outcome = smoke_test().unwrap();
        assert!(outcome.passed, "{:?} != {:?}", outcome.actual, outcome.expected);
        assert_eq!(outcome.result.report.original_count, 8);
        assert_eq!(outcome.result.report.malformed_count, 0);
    }

    #[test]
    fn near_namesakes_stay_apart() {
        let outcome = smoke_test().unwrap();
        let chens: Vec<_> = outcome
            .result
            .profiles
            .iter()
            .filter(|p| p.canonical_name.as_deref() == Some("Robert Chen"))
            .collect();
        assert_eq!(chens.len(), 2);
    }

    #[test]
    fn business_cluster_keeps_registry_name() {
        let outcome = smoke_test().unwrap();
        let harbor = outcome
            .result
            .profiles
            .iter()
            .find(|p| p.canonical_business_name.is_some())
            .unwrap();
        assert_eq!(harbor.canonical_business_name.as_deref(), Some("Harbor View Holdings LLC"));
        assert_eq!(harbor.record_ids.len(), 2);
        assert_eq!(harbor.properties, vec!["BOS-0301-118"]);
    }
}
