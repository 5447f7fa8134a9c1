use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::columns::ColumnRoleMap;
use crate::config::StockPolicy;
use crate::ledger::InventoryRecord;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A plain table: ordered headers plus ordered rows keyed by header.
///
/// This is the only shape the engine reads. CSV files, workbook sheets and
/// test fixtures are all turned into a `Table` before a run starts.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Human-readable source name, used in error messages.
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row given positionally. Extra cells are dropped, missing
    /// cells are left absent. When a header repeats, the first column wins.
    pub fn push_row<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row = HashMap::with_capacity(self.headers.len());
        for (header, value) in self.headers.iter().zip(values) {
            row.entry(header.clone()).or_insert_with(|| value.into());
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find the header that equals `name`, ignoring case and surrounding whitespace.
    pub fn find_column(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.headers
            .iter()
            .find(|h| h.trim().eq_ignore_ascii_case(wanted))
            .map(|h| h.as_str())
    }

    /// Cell value for `column` in row `index`, or "" when absent.
    pub fn cell(&self, index: usize, column: &str) -> &str {
        self.rows
            .get(index)
            .and_then(|r| r.get(column))
            .map(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Everything one run needs, fully materialized.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    /// SKU → MSKU tables, applied in order (later entries replace earlier ones).
    pub mappings: Vec<Table>,
    pub combos: Option<Table>,
    pub inventory: Option<Table>,
    pub sales: Table,
}

// ---------------------------------------------------------------------------
// Per-row outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowStatus {
    Ok,
    InvalidRow,
    Unmapped,
    InvalidMsku,
    Duplicate,
    StockShortfall,
}

impl RowStatus {
    pub const ALL: [RowStatus; 6] = [
        Self::Ok,
        Self::InvalidRow,
        Self::Unmapped,
        Self::InvalidMsku,
        Self::Duplicate,
        Self::StockShortfall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InvalidRow => "invalid-row",
            Self::Unmapped => "unmapped",
            Self::InvalidMsku => "invalid-msku",
            Self::Duplicate => "duplicate",
            Self::StockShortfall => "stock-shortfall",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an output row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Direct,
    ComboExpansion,
}

impl std::fmt::Display for RowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::ComboExpansion => write!(f, "combo_expansion"),
        }
    }
}

/// One cleaned output row. A combo sale yields one of these per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRow {
    /// Zero-based index of the sales row this came from.
    pub source_row: usize,
    pub date: Option<String>,
    pub order_id: Option<String>,
    pub original_sku: String,
    pub msku: Option<String>,
    pub quantity: Option<i64>,
    pub source: RowSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_msku: Option<String>,
    pub status: RowStatus,
}

impl ReconciledRow {
    pub fn is_ok(&self) -> bool {
        self.status == RowStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Issue log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ColumnUnassigned,
    InvalidRow,
    UnresolvedIdentifier,
    UnknownCombo,
    InvalidMsku,
    InsufficientStock,
    DuplicateRow,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnUnassigned => write!(f, "column_unassigned"),
            Self::InvalidRow => write!(f, "invalid_row"),
            Self::UnresolvedIdentifier => write!(f, "unresolved_identifier"),
            Self::UnknownCombo => write!(f, "unknown_combo"),
            Self::InvalidMsku => write!(f, "invalid_msku"),
            Self::InsufficientStock => write!(f, "insufficient_stock"),
            Self::DuplicateRow => write!(f, "duplicate_row"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A traceable reason for every excluded (or warned) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// `None` for input-level issues such as an unassigned column role.
    pub row_index: Option<usize>,
    pub status: Option<RowStatus>,
    pub kind: IssueKind,
    pub severity: Severity,
    pub detail: String,
    /// The offending cell value (identifier, quantity, header name...).
    pub value: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub input_rows: usize,
    pub output_rows: usize,
    pub ok: usize,
    pub excluded: usize,
    pub warnings: usize,
    pub units_decremented: i64,
    pub status_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub stock_policy: StockPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub columns: ColumnRoleMap,
    pub rows: Vec<ReconciledRow>,
    pub log: Vec<LogEntry>,
    /// Stock left after every `ok` row was applied, in inventory load order.
    pub inventory: Vec<InventoryRecord>,
}

impl ReconResult {
    pub fn ok_rows(&self) -> impl Iterator<Item = &ReconciledRow> {
        self.rows.iter().filter(|r| r.is_ok())
    }

    pub fn rows_with_status(&self, status: RowStatus) -> impl Iterator<Item = &ReconciledRow> {
        self.rows.iter().filter(move |r| r.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_zips_headers_and_keeps_first_duplicate() {
        let mut t = Table::new("sales", vec!["SKU".into(), "Qty".into(), "SKU".into()]);
        t.push_row(["A-1", "2", "B-2"]);
        t.push_row(["C-3"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, "SKU"), "A-1");
        assert_eq!(t.cell(0, "Qty"), "2");
        assert_eq!(t.cell(1, "Qty"), "");
        assert_eq!(t.cell(5, "SKU"), "");
    }

    #[test]
    fn find_column_ignores_case_and_padding() {
        let t = Table::new("combos", vec!["Combo ".into(), "SKU1".into()]);
        assert_eq!(t.find_column("combo"), Some("Combo "));
        assert_eq!(t.find_column(" sku1"), Some("SKU1"));
        assert_eq!(t.find_column("sku2"), None);
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&RowStatus::StockShortfall).unwrap();
        assert_eq!(json, "\"stock-shortfall\"");
        assert_eq!(RowStatus::InvalidMsku.to_string(), "invalid-msku");
    }
}
