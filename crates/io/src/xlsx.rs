// Excel / ODS sheet import (xlsx, xlsm, xlsb, xls, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};

use skumap_recon::{ReconError, Table};

fn read_err(path: &Path, message: impl Into<String>) -> ReconError {
    ReconError::Read {
        path: path.display().to_string(),
        message: message.into(),
    }
}

pub fn sheet_names(path: &Path) -> Result<Vec<String>, ReconError> {
    let workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| read_err(path, format!("failed to open workbook: {e}")))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one worksheet into a [`Table`].
///
/// `sheet` is matched case-insensitively after trimming; `None` takes the
/// first sheet. See [`crate::table_from_records`] for the `header` search.
pub fn read_sheet(path: &Path, sheet: Option<&str>, header: Option<&str>) -> Result<Table, ReconError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| read_err(path, format!("failed to open workbook: {e}")))?;

    let names: Vec<String> = workbook.sheet_names().to_vec();
    let chosen = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.trim().eq_ignore_ascii_case(wanted.trim()))
            .cloned()
            .ok_or_else(|| {
                read_err(path, format!("no sheet named '{wanted}' (found: {})", names.join(", ")))
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| read_err(path, "workbook contains no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&chosen)
        .map_err(|e| read_err(path, format!("failed to read sheet '{chosen}': {e}")))?;

    let records: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    crate::table_from_records(&format!("{file}:{chosen}"), records, header)
}

/// Render a cell the way it would read in a CSV export.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integers without decimals (SKU codes and quantities are often numeric cells)
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Excel serial (1900 date system) to `YYYY-MM-DD`, with a time part only
/// when the serial has one.
fn serial_to_iso(serial: f64) -> String {
    // Round to whole seconds first so 23:59:59.6 carries into the next day.
    let total = (serial * 86_400.0).round();
    let days = (total / 86_400.0).floor();
    let seconds = (total - days * 86_400.0) as i64;
    let datetime = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .filter(|_| days.abs() < 3_000_000.0)
        .and_then(|base| base.checked_add_signed(Duration::days(days as i64)))
        .and_then(|dt| dt.checked_add_signed(Duration::seconds(seconds)));

    match datetime {
        Some(dt) if seconds == 0 => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_workbook(path: &Path) {
        let mut wb = Workbook::new();

        let ws = wb.add_worksheet();
        ws.set_name("Msku With Skus").unwrap();
        ws.write_string(0, 0, "sku").unwrap();
        ws.write_string(0, 1, "msku").unwrap();
        ws.write_string(1, 0, "SKU1").unwrap();
        ws.write_string(1, 1, "MSKU-A").unwrap();
        ws.write_number(2, 0, 1001.0).unwrap();
        ws.write_string(2, 1, "MSKU-B").unwrap();

        let ws = wb.add_worksheet();
        ws.set_name("Current Inventory").unwrap();
        ws.write_string(0, 0, "Inventory as of today").unwrap();
        ws.write_string(2, 0, "MSKU").unwrap();
        ws.write_string(2, 1, "Stock").unwrap();
        ws.write_string(3, 0, "MSKU-A").unwrap();
        ws.write_number(3, 1, 12.0).unwrap();

        wb.save(path).unwrap();
    }

    #[test]
    fn reads_named_sheet_and_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WMS.xlsx");
        write_workbook(&path);

        assert_eq!(sheet_names(&path).unwrap(), vec!["Msku With Skus", "Current Inventory"]);

        let first = read_sheet(&path, None, None).unwrap();
        assert_eq!(first.name, "WMS.xlsx:Msku With Skus");
        assert_eq!(first.cell(0, "msku"), "MSKU-A");
        // Numeric SKU cell comes through without a decimal point.
        assert_eq!(first.cell(1, "sku"), "1001");
    }

    #[test]
    fn header_search_skips_title_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WMS.xlsx");
        write_workbook(&path);

        let inv = read_sheet(&path, Some("current inventory"), Some("msku")).unwrap();
        assert_eq!(inv.headers, vec!["MSKU", "Stock"]);
        assert_eq!(inv.cell(0, "Stock"), "12");
    }

    #[test]
    fn unknown_sheet_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WMS.xlsx");
        write_workbook(&path);

        let err = read_sheet(&path, Some("Combos"), None).unwrap_err();
        assert!(matches!(err, ReconError::Read { .. }));
        assert!(err.to_string().contains("no sheet named 'Combos'"));
    }

    #[test]
    fn serial_dates() {
        assert_eq!(serial_to_iso(45292.0), "2024-01-01");
        assert_eq!(serial_to_iso(45292.5), "2024-01-01 12:00:00");
        assert_eq!(serial_to_iso(45292.999_999_9), "2024-01-02");
    }

    #[test]
    fn float_cells_render_like_csv() {
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
