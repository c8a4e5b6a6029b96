// Kaitz CLI - build reconciled economic panels from source extracts

mod exit_codes;
mod panel;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "kaitz")]
#[command(about = "Reconcile labor, wage, demographic and policy sources into one panel")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source, merge, and write the panel plus its coverage report
    #[command(after_help = "\
Examples:
  kaitz build county.toml
  kaitz build state.toml --output out/state_panel.csv --report out/coverage.json
  kaitz build county.toml --json > coverage.json
  kaitz build county.toml --fail-on-attrition")]
    Build {
        /// Panel config (TOML); source patterns resolve relative to it
        config: PathBuf,

        /// Panel CSV path (overrides output.panel)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Coverage report path (overrides output.report)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the coverage report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 6 if any inner join dropped rows
        #[arg(long)]
        fail_on_attrition: bool,
    },

    /// Load every source and report what was found, without merging
    #[command(after_help = "\
Examples:
  kaitz check county.toml
  kaitz check state.toml --json")]
    Check {
        /// Panel config (TOML)
        config: PathBuf,

        /// Print sources, failures and input fingerprints as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a config without touching any source
    Validate {
        /// Panel config (TOML)
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("KAITZ_COMMIT"), ")",
            "\nengine:  kaitz-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("KAITZ_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("KAITZ_COMMIT"), ")",
            "\nengine:  kaitz-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("KAITZ_TARGET"),
        )
    }
}

/// RUST_LOG sets the baseline; -v / -q override it.
fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let level = match (quiet, verbose) {
        (true, _) => Some(LevelFilter::Warn),
        (false, 0) => None,
        (false, 1) => Some(LevelFilter::Debug),
        (false, _) => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    // A logger may already be installed; keep it.
    builder.try_init().ok();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Build {
            config,
            output,
            report,
            json,
            fail_on_attrition,
        } => panel::cmd_build(config, output, report, json, fail_on_attrition),
        Commands::Check { config, json } => panel::cmd_check(config, json),
        Commands::Validate { config } => panel::cmd_validate(config),
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

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
