// skumap CLI - reconcile marketplace sales exports against SKU/MSKU mappings and inventory

mod classify;
mod exit_codes;
mod recon;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "skumap")]
#[command(about = "Map sales SKUs to master SKUs, expand combos and adjust inventory")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). Without it RUST_LOG applies.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a sales file against mappings, combos and inventory
    #[command(after_help = "\
Examples:
  skumap run --config skumap.toml
  skumap run --config skumap.toml --output cleaned.csv --log-out issues.csv
  skumap run --mappings msku_with_skus.csv --combos combos.csv \\
             --inventory inventory.csv --sales orders.csv --json
  skumap run --mappings 'WMS.xlsx#Msku With Skus' --mappings 'WMS.xlsx#Chronology' \\
             --combos 'WMS.xlsx#Combos skus' --inventory 'WMS.xlsx#Current Inventory' \\
             --sales orders.csv --strict

A workbook source takes its sheet after '#'. Flags override the config's [files].")]
    Run(recon::RunArgs),

    /// Show which column each role would be assigned to
    #[command(after_help = "\
Examples:
  skumap classify orders.csv
  skumap classify orders.csv --config skumap.toml --json")]
    Classify {
        /// Sales file (CSV/TSV or workbook, optionally 'file.xlsx#Sheet')
        sales: String,

        /// Config file supplying column rules and pinned columns
        #[arg(long, short = 'c')]
        config: Option<std::path::PathBuf>,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a config file and load its reference tables without reconciling
    #[command(after_help = "\
Examples:
  skumap validate skumap.toml")]
    Validate {
        /// Path to the .toml config file
        config: std::path::PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  skumap-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        _ => Some(LevelFilter::Debug),
    };
    match level {
        Some(level) => {
            env_logger::builder().filter_level(level).init();
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => recon::cmd_run(args),
        Commands::Classify { sales, config, json } => classify::cmd_classify(sales, config, json),
        Commands::Validate { config } => recon::cmd_validate(config),
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

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<skumap_recon::ReconError> for CliError {
    fn from(err: skumap_recon::ReconError) -> Self {
        let hint = match &err {
            skumap_recon::ReconError::MissingColumn { .. } => {
                Some("reference column names can be changed under [reference] in the config".to_string())
            }
            skumap_recon::ReconError::FatalPrecondition(msg) if msg.contains("combo") => {
                Some("set reference.combos_required = false to run without a combo table".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}
