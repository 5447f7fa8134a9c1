// Integration tests for the `skumap` binary: exit codes, --json stdout and CSV exports.
//
// Run with: cargo test -p skumap-cli --test cli_tests -- --nocapture

use std::path::PathBuf;
use std::process::{Command, Output};

fn skumap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_skumap"));
    cmd.current_dir(fixtures_dir());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn code(out: &Output) -> i32 {
    out.status.code().expect("process exited by signal")
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_with_config_prints_summary() {
    let out = skumap().args(["run", "--config", "skumap.toml"]).output().unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("reconciled 12 sales rows into 13 rows: 6 ok, 7 excluded, 0 warnings"), "{err}");
    assert!(err.contains("stock-shortfall"), "{err}");
    assert!(err.contains("units decremented: 18"), "{err}");
    assert!(stdout(&out).is_empty());
}

#[test]
fn run_json_is_single_document() {
    let out = skumap()
        .args(["run", "-c", "skumap.toml", "--json", "-q"])
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let val: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(val["meta"]["config_name"], "meesho-daily");
    assert_eq!(val["meta"]["stock_policy"], "reject");
    assert_eq!(val["summary"]["ok"], 6);
    assert_eq!(val["summary"]["status_counts"]["duplicate"], 1);
    assert_eq!(val["rows"][1]["source"], "combo_expansion");
    assert_eq!(val["rows"][1]["combo_msku"], "GIFT-BOX");
    assert_eq!(val["rows"][4]["status"], "duplicate");
    assert!(val["rows"][0].get("combo_msku").is_none());
    assert_eq!(val["columns"][0]["role"], "order_id");
    assert_eq!(val["columns"][0]["header"], "Sub Order No");
    assert!(stderr(&out).is_empty(), "quiet run wrote: {}", stderr(&out));
}

#[test]
fn run_writes_csv_exports() {
    let dir = tempfile::tempdir().unwrap();
    let rows = dir.path().join("cleaned.csv");
    let log = dir.path().join("issues.csv");
    let inv = dir.path().join("inventory_after.csv");

    let out = skumap()
        .args(["run", "-c", "skumap.toml", "-q"])
        .arg("--output")
        .arg(&rows)
        .arg("--log-out")
        .arg(&log)
        .arg("--inventory-out")
        .arg(&inv)
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let rows = std::fs::read_to_string(rows).unwrap();
    let mut lines = rows.lines();
    assert_eq!(
        lines.next(),
        Some("Date,Order Id,Original SKU,Mapped MSKU,Quantity,Source,Combo MSKU,Status")
    );
    assert_eq!(lines.next(), Some("2024-01-05,1001_1,GOLDEN-APPLE-S,GA-01,2,direct,,ok"));
    assert_eq!(rows.lines().count(), 14);

    let log = std::fs::read_to_string(log).unwrap();
    assert!(log.starts_with("Row,Status,Kind,Severity,Value,Detail\n"));
    assert!(log.contains("5,unmapped,unresolved_identifier,error,UNKNOWN-SKU,"));
    assert_eq!(log.lines().count(), 8);

    let inv = std::fs::read_to_string(inv).unwrap();
    assert!(inv.starts_with("MSKU,Stock\nGA-01,8\nGA-02,0\nPEN-01,14\n"), "{inv}");
}

#[test]
fn strict_exits_when_rows_excluded() {
    let out = skumap().args(["run", "-c", "skumap.toml", "--strict", "-q"]).output().unwrap();
    assert_eq!(code(&out), 6);
    assert!(stderr(&out).contains("error: 7 of 13 output rows excluded"));
    assert!(stderr(&out).contains("hint:"));
}

#[test]
fn allow_negative_flag_overrides_config() {
    let out = skumap()
        .args(["run", "-c", "skumap.toml", "--allow-negative", "--json", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(val["meta"]["stock_policy"], "allow_negative");
    assert_eq!(val["summary"]["status_counts"]["stock-shortfall"], 0);
    assert_eq!(val["summary"]["warnings"], 3);
}

#[test]
fn flags_alone_work_without_config() {
    let out = skumap()
        .args([
            "run",
            "--mappings", "chronology.csv",
            "--mappings", "msku_with_skus.csv",
            "--combos", "combos_wide.csv",
            "--inventory", "inventory.csv",
            "--sales", "sales_flipkart.tsv",
            "--json", "-q",
        ])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    let val: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(val["rows"][0]["msku"], "PEN-01");
    // Without the config's pinned date column, "Ordered On" matches no date pattern.
    assert_eq!(val["columns"][1]["role"], "date");
    assert!(val["columns"][1]["header"].is_null());
}

#[test]
fn missing_combo_table_is_fatal_precondition() {
    let out = skumap()
        .args([
            "run",
            "--mappings", "msku_with_skus.csv",
            "--inventory", "inventory.csv",
            "--sales", "sales_meesho.csv",
        ])
        .output()
        .unwrap();
    assert_eq!(code(&out), 4);
    let err = stderr(&out);
    assert!(err.contains("fatal precondition"), "{err}");
    assert!(err.contains("combos_required"), "{err}");
}

#[test]
fn missing_sales_is_usage_error() {
    let out = skumap().args(["run", "--mappings", "msku_with_skus.csv"]).output().unwrap();
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("no sales file given"));
}

#[test]
fn unreadable_input_is_io_error() {
    let out = skumap()
        .args(["run", "-c", "skumap.toml", "--sales", "does_not_exist.csv"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 5);
    assert!(stderr(&out).contains("does_not_exist.csv"));
}

#[test]
fn invalid_config_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[stock]\npolicy = \"sometimes\"\n").unwrap();
    let out = skumap().args(["run", "-c"]).arg(&bad).output().unwrap();
    assert_eq!(code(&out), 3);

    std::fs::write(&bad, "date_formats = [\"\"]\n").unwrap();
    let out = skumap().arg("validate").arg(&bad).output().unwrap();
    assert_eq!(code(&out), 3);
}

// ===========================================================================
// classify / validate
// ===========================================================================

#[test]
fn classify_table_output() {
    let out = skumap().args(["classify", "sales_meesho.csv"]).output().unwrap();
    assert_eq!(code(&out), 0);
    let text = stdout(&out);
    assert!(text.lines().any(|l| l.starts_with("order_id") && l.contains("Sub Order No")));
    assert!(text.lines().any(|l| l.starts_with("date") && l.contains("Order Date")));
    assert!(text.contains("ignored: Reason for Credit Entry, Customer State, Product Name, Size"));
}

#[test]
fn classify_json_honours_pinned_columns() {
    let out = skumap()
        .args(["classify", "sales_flipkart.tsv", "-c", "flipkart.toml", "--json"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    let date = val
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["role"] == "date")
        .unwrap();
    assert_eq!(date["header"], "Ordered On");
    assert_eq!(date["pinned"], "Ordered On");
}

#[test]
fn validate_reports_reference_counts() {
    let out = skumap().args(["validate", "skumap.toml"]).output().unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("config ok: meesho-daily"));
    assert!(text.contains("mappings: 7 SKUs from 2 table(s)"));
    assert!(text.contains("combos: 2"));
    assert!(text.contains("inventory: 6 MSKUs"));
    assert!(text.contains("sales: 12 rows"));
}
