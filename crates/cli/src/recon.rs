//! `skumap run` / `skumap validate`: load tables, reconcile, export.

use std::path::{Path, PathBuf};

use clap::Args;

use skumap_recon::config::{ReconConfig, SourceSpec, StockPolicy};
use skumap_recon::model::{ReconInput, ReconResult, RowStatus};
use skumap_recon::{InventoryLedger, MappingCatalog, ReconError, Table};

use crate::exit_codes::{EXIT_ERROR, EXIT_IO, EXIT_ROWS_EXCLUDED};
use crate::CliError;

#[derive(Args)]
pub struct RunArgs {
    /// Config file (.toml); [files] paths are relative to it
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// SKU → MSKU table; repeat to merge several (later ones win)
    #[arg(long, value_name = "FILE")]
    pub mappings: Vec<String>,

    /// Combo expansion table
    #[arg(long, value_name = "FILE")]
    pub combos: Option<String>,

    /// Current inventory table (MSKU, stock)
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<String>,

    /// Sales export to reconcile
    #[arg(long, value_name = "FILE")]
    pub sales: Option<String>,

    /// Apply decrements past zero (with a warning) instead of rejecting the row
    #[arg(long)]
    pub allow_negative: bool,

    /// Write reconciled rows as CSV
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the issue log as CSV
    #[arg(long, value_name = "FILE")]
    pub log_out: Option<PathBuf>,

    /// Write the stock-adjusted inventory as CSV
    #[arg(long, value_name = "FILE")]
    pub inventory_out: Option<PathBuf>,

    /// Output the full result as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero when any row is excluded
    #[arg(long)]
    pub strict: bool,

    /// Suppress the summary on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

// ---------------------------------------------------------------------------
// Shared loading
// ---------------------------------------------------------------------------

/// Config plus the directory its relative paths resolve against.
pub(crate) fn load_config(path: Option<&Path>) -> Result<(ReconConfig, PathBuf), CliError> {
    let Some(path) = path else {
        return Ok((ReconConfig::default(), PathBuf::new()));
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read config {}: {e}", path.display())))?;
    let config = ReconConfig::from_toml(&text)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    log::info!("config '{}' loaded from {}", config.name, path.display());
    Ok((config, base_dir))
}

/// `file.xlsx#Sheet` selects a worksheet; anything else is a plain path.
pub(crate) fn source_from_arg(arg: &str) -> SourceSpec {
    if let Some((path, sheet)) = arg.rsplit_once('#') {
        if !sheet.is_empty() && skumap_io::is_workbook(Path::new(path)) {
            return SourceSpec::Sheet {
                path: path.to_string(),
                sheet: Some(sheet.to_string()),
                header: None,
            };
        }
    }
    SourceSpec::Path(arg.to_string())
}

pub(crate) fn load_source(base_dir: &Path, spec: &SourceSpec) -> Result<Table, CliError> {
    Ok(skumap_io::load_source(base_dir, spec)?)
}

/// A flag wins over the config entry; flags resolve against the working directory.
fn pick_source(
    flag: Option<&String>,
    configured: Option<&SourceSpec>,
    base_dir: &Path,
) -> Result<Option<Table>, CliError> {
    match (flag, configured) {
        (Some(arg), _) => load_source(Path::new(""), &source_from_arg(arg)).map(Some),
        (None, Some(spec)) => load_source(base_dir, spec).map(Some),
        (None, None) => Ok(None),
    }
}

fn load_references(
    args: &RunArgs,
    config: &ReconConfig,
    base_dir: &Path,
) -> Result<(Vec<Table>, Option<Table>, Option<Table>), CliError> {
    let files = config.files.clone().unwrap_or_default();

    let mappings = if args.mappings.is_empty() {
        files
            .mappings
            .iter()
            .map(|spec| load_source(base_dir, spec))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        args.mappings
            .iter()
            .map(|arg| load_source(Path::new(""), &source_from_arg(arg)))
            .collect::<Result<Vec<_>, _>>()?
    };
    let combos = pick_source(args.combos.as_ref(), files.combos.as_ref(), base_dir)?;
    let inventory = pick_source(args.inventory.as_ref(), files.inventory.as_ref(), base_dir)?;
    Ok((mappings, combos, inventory))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let (mut config, base_dir) = load_config(args.config.as_deref())?;
    if args.allow_negative {
        config.stock.policy = StockPolicy::AllowNegative;
    }

    let files = config.files.clone().unwrap_or_default();
    let sales = pick_source(args.sales.as_ref(), files.sales.as_ref(), &base_dir)?.ok_or_else(|| {
        CliError::usage("no sales file given")
            .with_hint("pass --sales FILE or set [files] sales = \"...\" in the config")
    })?;
    let (mappings, combos, inventory) = load_references(&args, &config, &base_dir)?;

    let input = ReconInput {
        mappings,
        combos,
        inventory,
        sales,
    };
    let result = skumap_recon::run(&config, &input)?;

    if let Some(path) = &args.output {
        skumap_io::csv::export_rows(path, &result.rows)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(path) = &args.log_out {
        skumap_io::csv::export_log(path, &result.log)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(path) = &args.inventory_out {
        skumap_io::csv::export_inventory(path, &result.inventory)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }

    if args.json {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    if !args.quiet {
        print_summary(&result);
    }

    if args.strict && result.summary.excluded > 0 {
        return Err(CliError::new(
            EXIT_ROWS_EXCLUDED,
            format!("{} of {} output rows excluded (--strict)", result.summary.excluded, result.summary.output_rows),
        )
        .with_hint("write the reasons with --log-out FILE"));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "reconciled {} sales rows into {} rows: {} ok, {} excluded, {} warnings",
        s.input_rows, s.output_rows, s.ok, s.excluded, s.warnings
    );
    for status in RowStatus::ALL.iter().filter(|st| **st != RowStatus::Ok) {
        let n = s.status_counts.get(status.as_str()).copied().unwrap_or(0);
        if n > 0 {
            eprintln!("  {:<16} {n}", status.as_str());
        }
    }
    for a in result.columns.unassigned() {
        eprintln!("  column for '{}' not found", a.role);
    }
    eprintln!("units decremented: {}", s.units_decremented);
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(Some(&config_path))?;
    println!("config ok: {}", config.name);

    let Some(files) = config.files.as_ref() else {
        println!("no [files] section; reference tables not checked");
        return Ok(());
    };

    let mappings = files
        .mappings
        .iter()
        .map(|spec| load_source(&base_dir, spec))
        .collect::<Result<Vec<_>, _>>()?;
    let combos = files
        .combos
        .as_ref()
        .map(|spec| load_source(&base_dir, spec))
        .transpose()?;
    let catalog = MappingCatalog::from_tables(&mappings, combos.as_ref(), &config.reference)?;
    if catalog.mapping_len() == 0 {
        return Err(ReconError::FatalPrecondition("no SKU → MSKU mappings loaded".into()).into());
    }
    println!("mappings: {} SKUs from {} table(s)", catalog.mapping_len(), mappings.len());
    println!("combos: {}", catalog.combo_len());

    if let Some(spec) = &files.inventory {
        let table = load_source(&base_dir, spec)?;
        let ledger = InventoryLedger::from_table(&table, &config.reference)?;
        println!("inventory: {} MSKUs", ledger.len());
    }

    if let Some(spec) = &files.sales {
        let table = load_source(&base_dir, spec)?;
        println!("sales: {} rows", table.len());
    }
    Ok(())
}
