//! `skumap-recon`: SKU → MSKU sales reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns cleaned rows, an
//! issue log and the remaining inventory. No CLI or IO dependencies.

pub mod catalog;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod summary;

pub use catalog::{normalize_id, MappingCatalog};
pub use columns::{ColumnClassifier, ColumnRoleMap, Role, Tier};
pub use config::{ReconConfig, StockPolicy};
pub use engine::{run, ReconciliationEngine};
pub use error::ReconError;
pub use ledger::{InventoryLedger, InventoryRecord};
pub use model::{
    IssueKind, LogEntry, ReconInput, ReconResult, ReconciledRow, RowSource, RowStatus, Severity,
    Table,
};
