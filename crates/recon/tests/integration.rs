use std::collections::HashMap;
use std::path::PathBuf;

use skumap_recon::config::{ReconConfig, SourceSpec, StockPolicy};
use skumap_recon::engine::{run, ReconciliationEngine};
use skumap_recon::model::{IssueKind, ReconInput, ReconResult, RowSource, RowStatus, Severity};
use skumap_recon::{InventoryLedger, MappingCatalog, Table};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_config(name: &str) -> ReconConfig {
    let text = std::fs::read_to_string(fixtures_dir().join(name)).unwrap();
    let config = ReconConfig::from_toml(&text).unwrap();
    config.validate().unwrap();
    config
}

fn load_input(config: &ReconConfig) -> ReconInput {
    let dir = fixtures_dir();
    let files = config.files.as_ref().expect("fixture config lists files");
    let load = |spec: &SourceSpec| skumap_io::load_source(&dir, spec).unwrap();
    ReconInput {
        mappings: files.mappings.iter().map(load).collect(),
        combos: files.combos.as_ref().map(load),
        inventory: files.inventory.as_ref().map(load),
        sales: load(files.sales.as_ref().expect("fixture config lists sales")),
    }
}

fn load_and_run(config: &ReconConfig) -> ReconResult {
    run(config, &load_input(config)).unwrap()
}

fn stock(result: &ReconResult) -> HashMap<&str, i64> {
    result
        .inventory
        .iter()
        .map(|r| (r.msku.as_str(), r.stock_on_hand))
        .collect()
}

fn statuses(result: &ReconResult) -> Vec<(usize, RowStatus)> {
    result.rows.iter().map(|r| (r.source_row, r.status)).collect()
}

// -------------------------------------------------------------------------
// End-to-end
// -------------------------------------------------------------------------

#[test]
fn meesho_export_end_to_end() {
    let result = load_and_run(&load_config("skumap.toml"));

    assert_eq!(result.meta.config_name, "meesho-daily");
    assert_eq!(result.columns.header(skumap_recon::Role::OrderId), Some("Sub Order No"));
    assert_eq!(result.columns.header(skumap_recon::Role::Date), Some("Order Date"));

    assert_eq!(
        statuses(&result),
        vec![
            (0, RowStatus::Ok),
            (1, RowStatus::Ok),
            (1, RowStatus::Ok),
            (2, RowStatus::Ok),
            (3, RowStatus::Duplicate),
            (4, RowStatus::InvalidMsku),
            (5, RowStatus::Unmapped),
            (6, RowStatus::StockShortfall),
            (7, RowStatus::StockShortfall),
            (8, RowStatus::InvalidRow),
            (9, RowStatus::Ok),
            (10, RowStatus::InvalidRow),
            (11, RowStatus::Ok),
        ]
    );

    assert_eq!(result.summary.input_rows, 12);
    assert_eq!(result.summary.output_rows, 13);
    assert_eq!(result.summary.ok, 6);
    assert_eq!(result.summary.excluded, 7);
    assert_eq!(result.summary.units_decremented, 18);
    assert_eq!(result.summary.status_counts["stock-shortfall"], 2);

    let stock = stock(&result);
    assert_eq!(stock["GA-01"], 8);
    assert_eq!(stock["GA-02"], 0);
    assert_eq!(stock["PEN-01"], 14);
    assert_eq!(stock["MUG-01"], 2);
    assert_eq!(stock["TEA-01"], 0);
    assert_eq!(stock["NB-01"], 0);
}

#[test]
fn combo_rows_carry_parent_and_multiplied_quantity() {
    let result = load_and_run(&load_config("skumap.toml"));
    let gift: Vec<_> = result.rows.iter().filter(|r| r.source_row == 1).collect();

    assert_eq!(gift.len(), 2);
    assert_eq!(gift[0].msku.as_deref(), Some("MUG-01"));
    assert_eq!(gift[0].quantity, Some(1));
    assert_eq!(gift[1].msku.as_deref(), Some("TEA-01"));
    assert_eq!(gift[1].quantity, Some(2));
    for r in gift {
        assert_eq!(r.source, RowSource::ComboExpansion);
        assert_eq!(r.combo_msku.as_deref(), Some("GIFT-BOX"));
        assert_eq!(r.order_id.as_deref(), Some("1002_1"));
    }

    let pens = &result.rows[3];
    assert_eq!(pens.msku.as_deref(), Some("PEN-01"));
    assert_eq!(pens.quantity, Some(6));
    assert_eq!(pens.date.as_deref(), Some("2024-01-05"));
}

#[test]
fn every_excluded_row_has_a_log_entry() {
    let result = load_and_run(&load_config("skumap.toml"));

    for row in result.rows.iter().filter(|r| !r.is_ok()) {
        let hits = result
            .log
            .iter()
            .filter(|e| e.row_index == Some(row.source_row) && e.status == Some(row.status))
            .count();
        assert!(hits >= 1, "row {} ({}) has no log entry", row.source_row, row.status);
    }

    let unresolved: Vec<_> = result
        .log
        .iter()
        .filter(|e| e.kind == IssueKind::UnresolvedIdentifier)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].row_index, Some(5));
    assert_eq!(unresolved[0].value, "UNKNOWN-SKU");
    assert!(result.log.iter().all(|e| e.kind != IssueKind::ColumnUnassigned));
}

#[test]
fn stock_never_goes_negative_under_reject() {
    let result = load_and_run(&load_config("skumap.toml"));
    assert!(result.inventory.iter().all(|r| r.stock_on_hand >= 0));
}

#[test]
fn later_mapping_table_wins() {
    let config = load_config("flipkart.toml");
    let result = load_and_run(&config);
    // PEN-BLUE maps to PEN-OLD in chronology.csv, PEN-01 in msku_with_skus.csv.
    assert_eq!(result.rows[0].msku.as_deref(), Some("PEN-01"));
    assert_eq!(result.rows[0].status, RowStatus::Ok);
}

#[test]
fn wide_combo_layout_and_pinned_date() {
    let result = load_and_run(&load_config("flipkart.toml"));

    assert_eq!(result.columns.header(skumap_recon::Role::Date), Some("Ordered On"));
    assert_eq!(result.columns.header(skumap_recon::Role::OrderId), Some("Order Item ID"));

    let gift: Vec<_> = result.rows.iter().filter(|r| r.source_row == 1).collect();
    let expanded: Vec<(&str, i64)> = gift
        .iter()
        .map(|r| (r.msku.as_deref().unwrap_or(""), r.quantity.unwrap_or(0)))
        .collect();
    assert_eq!(expanded, vec![("MUG-01", 1), ("TEA-01", 2)]);
    assert!(gift.iter().all(|r| r.date.as_deref() == Some("2024-01-05")));
}

#[test]
fn allow_negative_keeps_rows_and_warns() {
    let mut config = load_config("skumap.toml");
    config.stock.policy = StockPolicy::AllowNegative;
    let result = load_and_run(&config);

    assert_eq!(result.rows_with_status(RowStatus::StockShortfall).count(), 0);
    let warnings: Vec<_> = result
        .log
        .iter()
        .filter(|e| e.severity == Severity::Warning && e.kind == IssueKind::InsufficientStock)
        .collect();
    // GA-02 on rows 6 and 9, NB-01 on row 7.
    assert_eq!(warnings.len(), 3);
    assert_eq!(result.summary.warnings, 3);

    let stock = stock(&result);
    assert_eq!(stock["GA-02"], -6);
    assert_eq!(stock["NB-01"], -1);
}

#[test]
fn conservation_of_units() {
    let config = load_config("skumap.toml");
    let input = load_input(&config);
    let before: i64 = input
        .inventory
        .as_ref()
        .unwrap()
        .rows
        .iter()
        .map(|r| r.get("stock").unwrap().parse::<i64>().unwrap())
        .sum();

    let result = run(&config, &input).unwrap();
    let after: i64 = result.inventory.iter().map(|r| r.stock_on_hand).sum();
    let ok_units: i64 = result.ok_rows().map(|r| r.quantity.unwrap()).sum();
    assert_eq!(before - after, ok_units);
}

// -------------------------------------------------------------------------
// Preconditions + edge cases
// -------------------------------------------------------------------------

#[test]
fn missing_combo_table_is_fatal_by_default() {
    let config = load_config("skumap.toml");
    let mut input = load_input(&config);
    input.combos = None;
    let err = run(&config, &input).unwrap_err();
    assert!(err.is_fatal_precondition());
}

#[test]
fn empty_inventory_is_fatal() {
    let config = load_config("skumap.toml");
    let mut input = load_input(&config);
    input.inventory = Some(Table::new("inventory.csv", vec!["msku".into(), "stock".into()]));
    let err = run(&config, &input).unwrap_err();
    assert!(err.is_fatal_precondition());
    assert!(err.to_string().contains("inventory"));
}

#[test]
fn sales_without_quantity_column_touch_nothing() {
    let config = load_config("skumap.toml");
    let mut input = load_input(&config);
    let mut sales = Table::new("sales", vec!["Sub Order No".into(), "SKU".into()]);
    sales.push_row(["1", "GOLDEN-APPLE-S"]);
    sales.push_row(["2", "GIFT-BOX"]);
    input.sales = sales;

    let result = run(&config, &input).unwrap();
    assert!(result.rows.iter().all(|r| r.status == RowStatus::InvalidRow));
    let stock = stock(&result);
    assert_eq!(stock["GA-01"], 10);
    assert_eq!(stock["MUG-01"], 3);
}

#[test]
fn engine_reuses_caller_ledger_across_batches() {
    let config = load_config("skumap.toml");
    let input = load_input(&config);
    let catalog =
        MappingCatalog::from_tables(&input.mappings, input.combos.as_ref(), &config.reference).unwrap();
    let mut ledger =
        InventoryLedger::from_table(input.inventory.as_ref().unwrap(), &config.reference).unwrap();

    let mut batch = Table::new("batch", vec!["SKU".into(), "Quantity".into()]);
    batch.push_row(["MUG-WHITE", "2"]);
    let engine = ReconciliationEngine::new(&config, &catalog);

    let first = engine.reconcile(&batch, &mut ledger).unwrap();
    let second = engine.reconcile(&batch, &mut ledger).unwrap();
    assert_eq!(first.rows[0].status, RowStatus::Ok);
    // Second batch sees the stock left by the first: 3 - 2 = 1 < 2.
    assert_eq!(second.rows[0].status, RowStatus::StockShortfall);
    assert_eq!(ledger.get("MUG-01"), Ok(1));
}
