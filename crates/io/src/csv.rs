// CSV/TSV import and export

use std::io::{Read, Write};
use std::path::Path;

use skumap_recon::ledger::InventoryRecord;
use skumap_recon::model::{LogEntry, ReconciledRow};
use skumap_recon::{ReconError, Table};

pub const ROW_HEADERS: [&str; 8] = [
    "Date",
    "Order Id",
    "Original SKU",
    "Mapped MSKU",
    "Quantity",
    "Source",
    "Combo MSKU",
    "Status",
];

pub const LOG_HEADERS: [&str; 6] = ["Row", "Status", "Kind", "Severity", "Value", "Detail"];

pub const INVENTORY_HEADERS: [&str; 2] = ["MSKU", "Stock"];

/// Read a delimited file into a [`Table`]. The delimiter is sniffed.
pub fn read_table(path: &Path, header: Option<&str>) -> Result<Table, ReconError> {
    let content = read_file_as_utf8(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_table(&name, &content, header).map_err(|e| match e {
        ReconError::Io(message) => ReconError::Read {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Parse delimited text already in memory.
pub fn parse_table(name: &str, content: &str, header: Option<&str>) -> Result<Table, ReconError> {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReconError::Io(e.to_string()))?;
        records.push(record.iter().map(|f| f.to_string()).collect());
    }
    crate::table_from_records(name, records, header)
}

/// Pick the delimiter (tab, semicolon, comma, pipe) that gives the most
/// consistent multi-field split over the first lines.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(10).collect();

    let field_count = |line: &str, delim: u8| {
        csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.len())
            .unwrap_or(1)
    };

    let mut best = b',';
    let mut best_score = 0usize;
    for delim in [b'\t', b';', b',', b'|'] {
        let counts: Vec<usize> = sample.iter().map(|line| field_count(line, delim)).collect();
        let Some(&target) = counts.first() else { break };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

/// Read file and convert to UTF-8 if needed (Excel-exported CSVs are often Windows-1252)
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReconError> {
    let read_err = |e: std::io::Error| ReconError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn write_err(e: csv::Error) -> ReconError {
    ReconError::Io(e.to_string())
}

/// Cleaned rows, one line per reconciled row (all statuses).
pub fn write_rows<W: Write>(writer: W, rows: &[ReconciledRow]) -> Result<(), ReconError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(ROW_HEADERS).map_err(write_err)?;
    for r in rows {
        let quantity = r.quantity.map(|q| q.to_string()).unwrap_or_default();
        let source = r.source.to_string();
        w.write_record([
            r.date.as_deref().unwrap_or(""),
            r.order_id.as_deref().unwrap_or(""),
            r.original_sku.as_str(),
            r.msku.as_deref().unwrap_or(""),
            quantity.as_str(),
            source.as_str(),
            r.combo_msku.as_deref().unwrap_or(""),
            r.status.as_str(),
        ])
        .map_err(write_err)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_log<W: Write>(writer: W, log: &[LogEntry]) -> Result<(), ReconError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(LOG_HEADERS).map_err(write_err)?;
    for e in log {
        let row = e.row_index.map(|i| i.to_string()).unwrap_or_default();
        let status = e.status.map(|s| s.as_str()).unwrap_or("");
        let kind = e.kind.to_string();
        let severity = e.severity.to_string();
        w.write_record([
            row.as_str(),
            status,
            kind.as_str(),
            severity.as_str(),
            e.value.as_str(),
            e.detail.as_str(),
        ])
        .map_err(write_err)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_inventory<W: Write>(writer: W, inventory: &[InventoryRecord]) -> Result<(), ReconError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(INVENTORY_HEADERS).map_err(write_err)?;
    for rec in inventory {
        let stock = rec.stock_on_hand.to_string();
        w.write_record([rec.msku.as_str(), stock.as_str()])
            .map_err(write_err)?;
    }
    w.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<std::fs::File, ReconError> {
    std::fs::File::create(path)
        .map_err(|e| ReconError::Io(format!("cannot write {}: {e}", path.display())))
}

pub fn export_rows(path: &Path, rows: &[ReconciledRow]) -> Result<(), ReconError> {
    write_rows(create(path)?, rows)
}

pub fn export_log(path: &Path, log: &[LogEntry]) -> Result<(), ReconError> {
    write_log(create(path)?, log)
}

pub fn export_inventory(path: &Path, inventory: &[InventoryRecord]) -> Result<(), ReconError> {
    write_inventory(create(path)?, inventory)
}
