//! `ownerlink run|validate|explain|smoke`: batch owner resolution.

use std::path::{Path, PathBuf};

use ownerlink_resolve::ingest::load_records_file;
use ownerlink_resolve::model::{ConfidenceTier, ResolveResult};
use ownerlink_resolve::report::SINGLETON_BUCKET;
use ownerlink_resolve::{smoke_test, ResolveConfig, ResolveError, Resolver};

use crate::exit_codes::{EXIT_INPUT, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SMOKE_MISMATCH, EXIT_USAGE};
use crate::CliError;

/// Map an engine error onto the exit-code contract.
pub fn exit_code_for(err: &ResolveError) -> u8 {
    match err {
        ResolveError::ConfigParse(_) | ResolveError::Configuration(_) => EXIT_INVALID_CONFIG,
        ResolveError::InputParse(_) | ResolveError::Io(_) | ResolveError::MalformedRecord { .. } => EXIT_INPUT,
        ResolveError::UnknownRecord(_) => EXIT_USAGE,
        ResolveError::InternalScoring { .. } | ResolveError::WorkerPool(_) | ResolveError::Cancelled { .. } => {
            EXIT_RUNTIME
        }
    }
}

fn resolve_err(err: ResolveError) -> CliError {
    let code = exit_code_for(&err);
    let error = CliError::new(code, err.to_string());
    match code {
        EXIT_INVALID_CONFIG => error.with_hint("check the file with `ownerlink validate <config>`"),
        EXIT_USAGE => error.with_hint("records without an id are named rec-0001, rec-0002, ... by position"),
        _ => error,
    }
}

fn load_config(path: Option<&Path>) -> Result<ResolveConfig, CliError> {
    let Some(path) = path else {
        return Ok(ResolveConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, format!("cannot read config {}: {e}", path.display())))?;
    ResolveConfig::from_toml(&text).map_err(resolve_err)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))
}

pub fn cmd_run(
    records_path: PathBuf,
    config_path: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;
    let records = load_records_file(&records_path).map_err(resolve_err)?;
    log::info!("loaded {} records from {}", records.len(), records_path.display());

    let result = Resolver::new(config).run(&records).map_err(resolve_err)?;

    let json_str = to_json(&result)?;
    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);
    Ok(())
}

/// Human summary on stderr; stdout is reserved for JSON.
fn print_summary(result: &ResolveResult) {
    let r = &result.report;
    eprintln!(
        "resolved {} records into {} owners: {} duplicates ({:.2}%), {} malformed",
        r.original_count, r.unique_count, r.duplicates_found, r.deduplication_rate, r.malformed_count,
    );
    let count = |key: &str| r.tier_distribution.get(key).copied().unwrap_or(0);
    let tiers: Vec<String> = ConfidenceTier::ALL
        .iter()
        .map(|t| format!("{t} {}", count(&t.to_string())))
        .chain(std::iter::once(format!("{SINGLETON_BUCKET} {}", count(SINGLETON_BUCKET))))
        .collect();
    eprintln!("tiers: {}", tiers.join(", "));
    eprintln!(
        "{} mode, {} candidate pairs scored",
        result.meta.blocking_mode, result.meta.candidate_pairs
    );
    for m in &r.malformed_records {
        eprintln!("  excluded {} (index {}): {}: {}", m.record_id, m.index, m.field, m.reason);
    }
    if !r.scoring_failures.is_empty() {
        eprintln!("{} pairs could not be scored and were treated as no match", r.scoring_failures.len());
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    eprintln!(
        "config '{}' is valid: merge threshold {:.2}, blocking {}, {} authority sources",
        config.name,
        config.merge_threshold,
        config.blocking.mode,
        config.sources.authority.len(),
    );
    Ok(())
}

pub fn cmd_explain(
    records_path: PathBuf,
    left: String,
    right: String,
    config_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;
    let records = load_records_file(&records_path).map_err(resolve_err)?;
    let score = Resolver::new(config).explain(&records, &left, &right).map_err(resolve_err)?;

    println!("{}", to_json(&score)?);
    eprintln!("{} vs {}: {:.4} ({})", score.left, score.right, score.composite, score.tier);
    Ok(())
}

pub fn cmd_smoke(json_output: bool) -> Result<(), CliError> {
    let outcome = smoke_test().map_err(resolve_err)?;
    if json_output {
        println!("{}", to_json(&outcome)?);
    }
    eprintln!(
        "smoke: expected {} unique / {} duplicates, got {} / {}: {}",
        outcome.expected.unique,
        outcome.expected.duplicates,
        outcome.actual.unique,
        outcome.actual.duplicates,
        if outcome.passed { "pass" } else { "FAIL" },
    );
    if outcome.passed {
        Ok(())
    } else {
        Err(CliError::new(EXIT_SMOKE_MISMATCH, "smoke check counts did not match"))
    }
}
