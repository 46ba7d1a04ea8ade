// benchgrid CLI - declaration-to-benchmark reconciliation

mod exit_codes;
mod mapping;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use benchgrid_config::FileMappingStore;
use benchgrid_recon::ReconError;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "bgrid")]
#[command(about = "Reconcile new-product declarations against benchmark sales data")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding cached field mappings
    #[arg(long, global = true, env = "BENCHGRID_MAPPING_DIR", value_name = "DIR")]
    mapping_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation and write the review workbook
    #[command(after_help = "\
Examples:
  bgrid run review.recon.toml --declarations 申报.xlsx --mapping 映射.xlsx
  bgrid run review.recon.toml --declarations 申报.xlsx
  bgrid run review.recon.toml --declarations d.csv --benchmarks b.csv --output out.xlsx
  bgrid run review.recon.toml --declarations d.csv --json --show-query")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Declaration workbook or CSV
        #[arg(long, short = 'd')]
        declarations: PathBuf,

        /// Field mapping file (target, declaration, benchmark columns). Cached for later runs.
        #[arg(long, short = 'm')]
        mapping: Option<PathBuf>,

        /// Read benchmarks from a file instead of the configured database
        #[arg(long, short = 'b')]
        benchmarks: Option<PathBuf>,

        /// Report path (default: <file_prefix>_<timestamp>.xlsx in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Print the executed benchmark query to stderr
        #[arg(long)]
        show_query: bool,
    },

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  bgrid validate review.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Inspect or change the cached field mapping
    #[command(subcommand)]
    Mapping(mapping::MappingCommands),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  benchgrid-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = match cli.mapping_dir {
        Some(dir) => FileMappingStore::with_root(dir),
        None => FileMappingStore::new(),
    };

    let result = match cli.command {
        Commands::Run {
            config,
            declarations,
            mapping,
            benchmarks,
            output,
            json,
            show_query,
        } => recon::cmd_run(
            &store,
            recon::RunArgs {
                config,
                declarations,
                mapping,
                benchmarks,
                output,
                json,
                show_query,
            },
        ),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Mapping(cmd) => mapping::cmd_mapping(&store, cmd),
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
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::ModeDetermination(_) => {
                Some("every declaration row needs the same purchase mode value".to_string())
            }
            ReconError::Mapping(_) => {
                Some("the mapping file needs target, declaration and benchmark columns".to_string())
            }
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("check the file with: bgrid validate <config>".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}
