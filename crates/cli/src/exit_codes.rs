//! CLI Exit Code Registry
//!
//! Single source of truth for `ownerlink` exit codes.
//! Exit codes are part of the shell contract; batch scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad args, unknown record id)            |
//! | 3    | Config file unreadable, unparseable or invalid       |
//! | 4    | Input records unreadable or unparseable              |
//! | 5    | Runtime failure inside a resolution run              |
//! | 6    | Smoke check ran but counts did not match expectation |
//!
//! Adding a code: add the constant, document its trigger, update the table,
//! and wire it into `resolve::exit_code_for`.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, or a record id that is not in the batch.
/// Clap uses the same code for argument parse failures.
pub const EXIT_USAGE: u8 = 2;

/// Config file missing, malformed TOML, or failed validation
/// (missing weight key, unordered thresholds, ...).
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Records file missing, unreadable, or not valid JSON/CSV.
pub const EXIT_INPUT: u8 = 4;

/// Run failed after starting (worker pool, cancellation, output write).
pub const EXIT_RUNTIME: u8 = 5;

/// `ownerlink smoke` completed but unique/duplicate counts differ from the fixture.
pub const EXIT_SMOKE_MISMATCH: u8 = 6;
