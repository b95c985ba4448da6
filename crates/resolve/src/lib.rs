//! `ownerlink-resolve`: owner identity resolution engine.
//!
//! Pure engine crate: receives pre-loaded owner records from any number of
//! sources, returns consolidated owner profiles plus an audit report.
//! No CLI concerns; file loading lives in [`ingest`] for convenience.

pub mod blocking;
pub mod cluster;
pub mod config;
pub mod consolidate;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod ingest;
pub mod model;
pub mod normalize;
pub mod report;
pub mod scorer;

pub use config::ResolveConfig;
pub use engine::{batch_deduplication, score_records, CancelToken, Resolver};
pub use error::ResolveError;
pub use fixtures::{smoke_test, SmokeOutcome};
pub use model::{ConsolidationReport, OwnerProfile, OwnerRecord, ResolveResult, SimilarityScore};
