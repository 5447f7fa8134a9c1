use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::catalog::{normalize_id, LookupError, MappingCatalog};
use crate::columns::{ColumnClassifier, ColumnRoleMap, Role};
use crate::config::{ReconConfig, StockPolicy};
use crate::error::ReconError;
use crate::ledger::{InventoryLedger, LedgerError};
use crate::model::{
    IssueKind, LogEntry, ReconInput, ReconMeta, ReconResult, ReconciledRow, RowSource, RowStatus,
    Severity, Table,
};
use crate::summary::compute_summary;

/// Run reconciliation per config: build the catalog and ledger from the
/// reference tables, then process every sales row in order.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    check_reference_tables(config, input)?;

    let catalog = MappingCatalog::from_tables(&input.mappings, input.combos.as_ref(), &config.reference)?;

    let inventory = input
        .inventory
        .as_ref()
        .ok_or_else(|| ReconError::FatalPrecondition("no inventory table supplied".into()))?;
    let mut ledger = InventoryLedger::from_table(inventory, &config.reference)?;

    if config.reference.combos_required && catalog.combo_len() == 0 {
        return Err(ReconError::FatalPrecondition(
            "combo table has no usable rows".into(),
        ));
    }

    ReconciliationEngine::new(config, &catalog).reconcile(&input.sales, &mut ledger)
}

/// Presence checks on the raw tables, before anything is parsed.
fn check_reference_tables(config: &ReconConfig, input: &ReconInput) -> Result<(), ReconError> {
    if input.mappings.is_empty() || input.mappings.iter().all(|t| t.is_empty()) {
        return Err(ReconError::FatalPrecondition(
            "SKU → MSKU mapping table is missing or empty".into(),
        ));
    }
    match &input.inventory {
        None => {
            return Err(ReconError::FatalPrecondition(
                "current inventory table is missing".into(),
            ))
        }
        Some(t) if t.is_empty() => {
            return Err(ReconError::FatalPrecondition(format!(
                "current inventory table '{}' is empty",
                t.name
            )))
        }
        Some(_) => {}
    }
    if config.reference.combos_required {
        match &input.combos {
            None => {
                return Err(ReconError::FatalPrecondition(
                    "combo table is missing".into(),
                ))
            }
            Some(t) if t.is_empty() => {
                return Err(ReconError::FatalPrecondition(format!(
                    "combo table '{}' is empty",
                    t.name
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives one pass over a sales table against a catalog and a ledger.
pub struct ReconciliationEngine<'a> {
    config: &'a ReconConfig,
    catalog: &'a MappingCatalog,
    classifier: ColumnClassifier,
}

/// Composite duplicate key: (order id, msku, date).
type DuplicateKey = (String, String, String);

/// Mutable bookkeeping for one pass.
#[derive(Default)]
struct Pass {
    rows: Vec<ReconciledRow>,
    log: Vec<LogEntry>,
    /// First source row each duplicate key was seen on.
    seen: HashMap<DuplicateKey, usize>,
}

/// Fields pulled out of one sales row.
struct RowContext {
    index: usize,
    raw_sku: String,
    date: Option<String>,
    order_id: Option<String>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(config: &'a ReconConfig, catalog: &'a MappingCatalog) -> Self {
        Self {
            config,
            catalog,
            classifier: ColumnClassifier::from_config(&config.columns),
        }
    }

    /// Classify the sales columns and reconcile every row, in order,
    /// against `ledger`. Only an empty catalog or ledger fails the run.
    pub fn reconcile(
        &self,
        sales: &Table,
        ledger: &mut InventoryLedger,
    ) -> Result<ReconResult, ReconError> {
        if self.catalog.mapping_len() == 0 {
            return Err(ReconError::FatalPrecondition(
                "SKU → MSKU catalog has no usable mappings".into(),
            ));
        }
        if ledger.is_empty() {
            return Err(ReconError::FatalPrecondition(
                "inventory ledger tracks no MSKUs".into(),
            ));
        }

        log::info!("reconciling {} rows from '{}'", sales.len(), sales.name);

        let columns = self.classifier.classify(&sales.headers);
        let mut pass = Pass::default();
        report_unassigned(&columns, &mut pass.log);

        for index in 0..sales.len() {
            self.process_row(index, sales, &columns, ledger, &mut pass);
        }

        let summary = compute_summary(sales.len(), &pass.rows, &pass.log);
        log::info!(
            "reconciled {} rows into {} outputs: {} ok, {} excluded, {} warnings",
            summary.input_rows,
            summary.output_rows,
            summary.ok,
            summary.excluded,
            summary.warnings
        );

        Ok(ReconResult {
            meta: ReconMeta {
                config_name: self.config.name.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                stock_policy: self.config.stock.policy,
            },
            summary,
            columns,
            rows: pass.rows,
            log: pass.log,
            inventory: ledger.snapshot(),
        })
    }

    fn process_row(
        &self,
        index: usize,
        sales: &Table,
        columns: &ColumnRoleMap,
        ledger: &mut InventoryLedger,
        pass: &mut Pass,
    ) {
        let cell = |role: Role| role_cell(sales, columns, index, role);

        let ctx = RowContext {
            index,
            raw_sku: cell(Role::Sku).to_string(),
            date: normalize_date(cell(Role::Date), &self.config.date_formats),
            order_id: Some(cell(Role::OrderId))
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        };
        let raw_quantity = cell(Role::Quantity);

        // 1. Required fields.
        if columns.header(Role::Sku).is_none() {
            return pass.invalid(&ctx, None, "no SKU/MSKU column in input", "");
        }
        if columns.header(Role::Quantity).is_none() {
            return pass.invalid(&ctx, None, "no quantity column in input", "");
        }
        if ctx.raw_sku.is_empty() {
            return pass.invalid(&ctx, None, "blank SKU/MSKU", "");
        }
        let quantity = match parse_quantity(raw_quantity) {
            Some(q) => q,
            None => return pass.invalid(&ctx, None, "quantity is not a whole number", raw_quantity),
        };
        if self.config.quantity.reject_non_positive && quantity <= 0 {
            return pass.invalid(&ctx, Some(quantity), "non-positive quantity", raw_quantity);
        }

        // 2. Resolve.
        let msku = match self.resolve_identifier(&ctx.raw_sku, ledger) {
            Ok(m) => m,
            Err(e) => {
                return pass.unmapped(&ctx, None, Some(quantity), IssueKind::UnresolvedIdentifier, e.to_string(), &ctx.raw_sku);
            }
        };

        // 3. Expand combos.
        if !self.catalog.is_combo(&msku) {
            return self.settle(&ctx, msku, quantity, None, ledger, pass);
        }

        let parts = match self.catalog.expand(&msku, quantity) {
            Ok(parts) => parts,
            Err(e @ LookupError::QuantityOverflow { .. }) => {
                return pass.invalid(&ctx, Some(quantity), &e.to_string(), raw_quantity);
            }
            Err(e) => {
                return pass.unmapped(&ctx, Some(&msku), Some(quantity), IssueKind::UnknownCombo, e.to_string(), &msku);
            }
        };

        log::debug!("row {index}: combo {msku} expands to {} components", parts.len());
        for (component, component_qty) in parts {
            match self.resolve_identifier(&component, ledger) {
                Ok(component_msku) => {
                    self.settle(&ctx, component_msku, component_qty, Some(&msku), ledger, pass)
                }
                Err(e) => pass.unmapped(
                    &ctx,
                    Some(&msku),
                    Some(component_qty),
                    IssueKind::UnresolvedIdentifier,
                    format!("combo {msku} component: {e}"),
                    &component,
                ),
            }
        }
    }

    /// A known MSKU (catalog value, combo key, or inventory entry) is used
    /// as-is; anything else must be a catalog SKU.
    fn resolve_identifier(&self, raw: &str, ledger: &InventoryLedger) -> Result<String, LookupError> {
        let id = normalize_id(raw);
        if self.catalog.is_known_msku(&id) || ledger.validate(&id) {
            return Ok(id);
        }
        self.catalog.resolve(&id).map(|m| m.to_string())
    }

    /// Duplicate check, inventory validation and decrement for one
    /// (msku, quantity) pair.
    fn settle(
        &self,
        ctx: &RowContext,
        msku: String,
        quantity: i64,
        combo: Option<&str>,
        ledger: &mut InventoryLedger,
        pass: &mut Pass,
    ) {
        let mut row = ReconciledRow {
            source_row: ctx.index,
            date: ctx.date.clone(),
            order_id: ctx.order_id.clone(),
            original_sku: ctx.raw_sku.clone(),
            msku: Some(msku.clone()),
            quantity: Some(quantity),
            source: if combo.is_some() { RowSource::ComboExpansion } else { RowSource::Direct },
            combo_msku: combo.map(|c| c.to_string()),
            status: RowStatus::Ok,
        };

        if let Some(order_id) = &ctx.order_id {
            let key = (order_id.clone(), msku.clone(), ctx.date.clone().unwrap_or_default());
            let first = *pass.seen.entry(key).or_insert(ctx.index);
            if first != ctx.index {
                row.status = RowStatus::Duplicate;
                pass.issue(
                    ctx.index,
                    RowStatus::Duplicate,
                    IssueKind::DuplicateRow,
                    Severity::Error,
                    format!("order {order_id} / {msku} already seen on row {first}"),
                    &msku,
                );
                pass.rows.push(row);
                return;
            }
        }

        if !ledger.validate(&msku) {
            row.status = RowStatus::InvalidMsku;
            pass.issue(
                ctx.index,
                RowStatus::InvalidMsku,
                IssueKind::InvalidMsku,
                Severity::Error,
                LedgerError::NotTracked(msku.clone()).to_string(),
                &msku,
            );
            pass.rows.push(row);
            return;
        }

        let available = ledger.get(&msku).unwrap_or_default();
        let outcome = match self.config.stock.policy {
            StockPolicy::Reject => ledger.decrement(&msku, quantity),
            StockPolicy::AllowNegative => ledger.force_decrement(&msku, quantity),
        };

        match outcome {
            Ok(remaining) => {
                if quantity > available {
                    pass.issue(
                        ctx.index,
                        RowStatus::Ok,
                        IssueKind::InsufficientStock,
                        Severity::Warning,
                        format!("stock for '{msku}' went negative: need {quantity}, had {available}"),
                        &msku,
                    );
                }
                log::debug!("row {}: {msku} -{quantity} -> {remaining}", ctx.index);
            }
            Err(e @ LedgerError::StockOverflow { .. }) => {
                row.status = RowStatus::InvalidRow;
                pass.issue(
                    ctx.index,
                    RowStatus::InvalidRow,
                    IssueKind::InvalidRow,
                    Severity::Error,
                    e.to_string(),
                    &quantity.to_string(),
                );
            }
            Err(e) => {
                row.status = RowStatus::StockShortfall;
                pass.issue(
                    ctx.index,
                    RowStatus::StockShortfall,
                    IssueKind::InsufficientStock,
                    Severity::Error,
                    e.to_string(),
                    &msku,
                );
            }
        }
        pass.rows.push(row);
    }
}

impl Pass {
    fn issue(
        &mut self,
        row_index: usize,
        status: RowStatus,
        kind: IssueKind,
        severity: Severity,
        detail: String,
        value: &str,
    ) {
        log::debug!("row {row_index}: {kind}: {detail}");
        self.log.push(LogEntry {
            row_index: Some(row_index),
            status: Some(status),
            kind,
            severity,
            detail,
            value: value.to_string(),
        });
    }

    fn invalid(&mut self, ctx: &RowContext, quantity: Option<i64>, detail: &str, value: &str) {
        self.issue(
            ctx.index,
            RowStatus::InvalidRow,
            IssueKind::InvalidRow,
            Severity::Error,
            detail.to_string(),
            value,
        );
        self.rows.push(excluded_row(ctx, None, quantity, RowStatus::InvalidRow));
    }

    fn unmapped(
        &mut self,
        ctx: &RowContext,
        combo: Option<&str>,
        quantity: Option<i64>,
        kind: IssueKind,
        detail: String,
        value: &str,
    ) {
        self.issue(ctx.index, RowStatus::Unmapped, kind, Severity::Error, detail, value);
        self.rows.push(excluded_row(ctx, combo, quantity, RowStatus::Unmapped));
    }
}

fn excluded_row(
    ctx: &RowContext,
    combo: Option<&str>,
    quantity: Option<i64>,
    status: RowStatus,
) -> ReconciledRow {
    ReconciledRow {
        source_row: ctx.index,
        date: ctx.date.clone(),
        order_id: ctx.order_id.clone(),
        original_sku: ctx.raw_sku.clone(),
        msku: None,
        quantity,
        source: if combo.is_some() { RowSource::ComboExpansion } else { RowSource::Direct },
        combo_msku: combo.map(|c| c.to_string()),
        status,
    }
}

fn role_cell<'t>(sales: &'t Table, columns: &ColumnRoleMap, index: usize, role: Role) -> &'t str {
    columns
        .header(role)
        .map(|h| sales.cell(index, h).trim())
        .unwrap_or("")
}

fn report_unassigned(columns: &ColumnRoleMap, log: &mut Vec<LogEntry>) {
    for a in columns.unassigned() {
        let (detail, value) = match &a.pinned {
            Some(pinned) => (format!("pinned column '{pinned}' for role '{}' not found", a.role), pinned.clone()),
            None => (format!("no column matched role '{}'", a.role), String::new()),
        };
        let severity = if a.role.is_required() { Severity::Error } else { Severity::Warning };
        log::warn!("{detail}");
        log.push(LogEntry {
            row_index: None,
            status: None,
            kind: IssueKind::ColumnUnassigned,
            severity,
            detail,
            value,
        });
    }
}

/// Whole-number quantity; `3.0` (as spreadsheets export it) counts as 3.
fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(q) = raw.parse::<i64>() {
        return Some(q);
    }
    let f: f64 = raw.parse().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

/// ISO date when `raw` parses under one of `formats`, otherwise the raw text.
fn normalize_date(raw: &str, formats: &[String]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(raw, fmt)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, fmt).map(|dt| dt.date()))
                .ok()
        })
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or_else(|| Some(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
