// Table I/O: CSV and Excel sources in, CSV exports out

pub mod csv;
pub mod xlsx;

use std::path::Path;

use skumap_recon::config::SourceSpec;
use skumap_recon::{ReconError, Table};

/// Extensions read through calamine rather than the CSV reader.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.iter().any(|w| w.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Load one table from a CSV/TSV file or a workbook sheet.
///
/// `sheet` picks a worksheet by name (first sheet when `None`); it is ignored
/// for delimited text. `header` names a cell of the header row, for sources
/// that carry title rows above the real header.
pub fn load_table(path: &Path, sheet: Option<&str>, header: Option<&str>) -> Result<Table, ReconError> {
    if is_workbook(path) {
        return xlsx::read_sheet(path, sheet, header);
    }
    if let Some(sheet) = sheet {
        log::warn!("{}: sheet '{sheet}' ignored for delimited text", path.display());
    }
    csv::read_table(path, header)
}

/// Load a configured source, resolving relative paths against `base_dir`.
pub fn load_source(base_dir: &Path, spec: &SourceSpec) -> Result<Table, ReconError> {
    let path = base_dir.join(spec.path());
    load_table(&path, spec.sheet(), spec.header())
}

/// Build a [`Table`] from raw records.
///
/// The header row is the first non-blank record, or with `header` set, the
/// first record holding a cell equal to it (case-insensitive). Fully blank
/// records after the header are dropped.
pub fn table_from_records(
    name: &str,
    records: Vec<Vec<String>>,
    header: Option<&str>,
) -> Result<Table, ReconError> {
    let is_blank = |r: &Vec<String>| r.iter().all(|c| c.trim().is_empty());

    let start = match header {
        None => records.iter().position(|r| !is_blank(r)),
        Some(wanted) => records
            .iter()
            .position(|r| r.iter().any(|c| c.trim().eq_ignore_ascii_case(wanted.trim()))),
    };
    let Some(start) = start else {
        return match header {
            Some(wanted) => Err(ReconError::MissingColumn {
                table: name.to_string(),
                column: wanted.to_string(),
            }),
            None => Ok(Table::new(name, Vec::new())),
        };
    };

    let mut records = records.into_iter().skip(start);
    let headers: Vec<String> = records
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = Table::new(name, headers);
    for record in records {
        if is_blank(&record) {
            continue;
        }
        table.push_row(record);
    }
    if start > 0 {
        log::debug!("{name}: header found on row {start}");
    }
    log::info!("{name}: {} rows, {} columns", table.len(), table.headers.len());
    Ok(table)
}
