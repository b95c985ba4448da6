// ownerlink CLI - offline owner identity resolution batches

mod exit_codes;
mod resolve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "ownerlink")]
#[command(about = "Resolve property-owner records from many sources into one profile per owner")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a batch of owner records into consolidated profiles
    #[command(after_help = "\
Examples:
  ownerlink run owners.json
  ownerlink run owners.csv --json
  ownerlink run owners.json --config strict.toml --output result.json")]
    Run {
        /// Records file (.json array or .csv with camelCase headers)
        records: PathBuf,

        /// Resolution config (TOML). Defaults apply when omitted.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print the full result JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the full result JSON to a file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Validate a resolution config without running
    #[command(after_help = "\
Examples:
  ownerlink validate resolve.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Show the field-by-field score for two records of a batch
    #[command(after_help = "\
Examples:
  ownerlink explain owners.json rec-0001 rec-0002
  ownerlink explain owners.csv cty-10042 lst-88-771 --config strict.toml")]
    Explain {
        /// Records file (.json or .csv)
        records: PathBuf,

        /// Id of the first record (supplied id, or rec-NNNN by position)
        left: String,

        /// Id of the second record
        right: String,

        /// Resolution config (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Resolve the built-in sample batch and check the expected counts
    Smoke {
        /// Print the smoke outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("OWNERLINK_COMMIT"), ")",
        "\nengine:  ownerlink-resolve ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("OWNERLINK_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { records, config, json, output } => resolve::cmd_run(records, config, json, output),
        Commands::Validate { config } => resolve::cmd_validate(config),
        Commands::Explain { records, left, right, config } => resolve::cmd_explain(records, left, right, config),
        Commands::Smoke { json } => resolve::cmd_smoke(json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
