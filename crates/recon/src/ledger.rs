use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::normalize_id;
use crate::config::ReferenceColumns;
use crate::error::ReconError;
use crate::model::Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRecord {
    pub msku: String,
    pub stock_on_hand: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("MSKU '{0}' is not in current inventory")]
    NotTracked(String),
    #[error("insufficient stock for '{msku}': need {requested}, have {available}")]
    InsufficientStock {
        msku: String,
        requested: i64,
        available: i64,
    },
    #[error("stock for '{msku}' would overflow (currently {stock})")]
    StockOverflow { msku: String, stock: i64 },
}

/// Current stock per MSKU for a single run.
///
/// Owned by exactly one run; every mutation goes through `&mut self`, so
/// decrements land in the order the engine issues them.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {
    order: Vec<String>,
    stock: HashMap<String, i64>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the inventory table's MSKU and stock columns. A blank stock
    /// cell counts as zero; a repeated MSKU adds to the existing stock.
    pub fn from_table(table: &Table, columns: &ReferenceColumns) -> Result<Self, ReconError> {
        let missing = |column: &str| ReconError::MissingColumn {
            table: table.name.clone(),
            column: column.to_string(),
        };
        let msku_col = table.find_column(&columns.msku).ok_or_else(|| missing(&columns.msku))?;
        let stock_col = table.find_column(&columns.stock).ok_or_else(|| missing(&columns.stock))?;

        let mut ledger = Self::new();
        for (i, row) in table.rows.iter().enumerate() {
            let msku = row.get(msku_col).map(|s| s.trim()).unwrap_or("");
            if msku.is_empty() {
                log::debug!("{}: row {i} skipped (blank msku)", table.name);
                continue;
            }
            let raw = row.get(stock_col).map(|s| s.as_str()).unwrap_or("");
            let stock = parse_stock(raw).ok_or_else(|| ReconError::BadReferenceValue {
                table: table.name.clone(),
                row: i,
                value: raw.to_string(),
                reason: "stock is not a whole number".into(),
            })?;
            let repeated = ledger.insert(msku, stock).map_err(|e| ReconError::BadReferenceValue {
                table: table.name.clone(),
                row: i,
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
            if repeated {
                log::warn!("{}: MSKU '{}' listed more than once, stock summed", table.name, normalize_id(msku));
            }
        }

        log::info!("inventory: {} MSKUs tracked", ledger.len());
        Ok(ledger)
    }

    /// Add stock for an MSKU. Returns true when it was already tracked.
    pub fn insert(&mut self, msku: &str, stock: i64) -> Result<bool, LedgerError> {
        let key = normalize_id(msku);
        match self.stock.get_mut(&key) {
            Some(existing) => {
                let current = *existing;
                *existing = current.checked_add(stock).ok_or(LedgerError::StockOverflow {
                    msku: key,
                    stock: current,
                })?;
                Ok(true)
            }
            None => {
                self.order.push(key.clone());
                self.stock.insert(key, stock);
                Ok(false)
            }
        }
    }

    pub fn get(&self, msku: &str) -> Result<i64, LedgerError> {
        let key = normalize_id(msku);
        self.stock
            .get(&key)
            .copied()
            .ok_or(LedgerError::NotTracked(key))
    }

    /// An MSKU is valid only if current inventory lists it, whatever its stock.
    pub fn validate(&self, msku: &str) -> bool {
        self.stock.contains_key(&normalize_id(msku))
    }

    /// Take `quantity` units. Fails without touching stock if that would
    /// go below zero.
    pub fn decrement(&mut self, msku: &str, quantity: i64) -> Result<i64, LedgerError> {
        let key = normalize_id(msku);
        let stock = self
            .stock
            .get_mut(&key)
            .ok_or_else(|| LedgerError::NotTracked(key.clone()))?;
        if quantity > *stock {
            return Err(LedgerError::InsufficientStock {
                msku: key,
                requested: quantity,
                available: *stock,
            });
        }
        *stock = checked_take(&key, *stock, quantity)?;
        Ok(*stock)
    }

    /// Take `quantity` units even if stock goes negative. Callers must flag it.
    pub fn force_decrement(&mut self, msku: &str, quantity: i64) -> Result<i64, LedgerError> {
        let key = normalize_id(msku);
        let stock = self
            .stock
            .get_mut(&key)
            .ok_or_else(|| LedgerError::NotTracked(key.clone()))?;
        *stock = checked_take(&key, *stock, quantity)?;
        Ok(*stock)
    }

    /// Current stock in load order.
    pub fn snapshot(&self) -> Vec<InventoryRecord> {
        self.order
            .iter()
            .map(|msku| InventoryRecord {
                msku: msku.clone(),
                stock_on_hand: self.stock.get(msku).copied().unwrap_or_default(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn checked_take(msku: &str, stock: i64, quantity: i64) -> Result<i64, LedgerError> {
    stock.checked_sub(quantity).ok_or_else(|| LedgerError::StockOverflow {
        msku: msku.to_string(),
        stock,
    })
}

/// Whole-number stock; floats beyond exact integer range are refused
/// rather than saturated.
fn parse_stock(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let f: f64 = raw.parse().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}
