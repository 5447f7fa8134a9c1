use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::config::ReferenceColumns;
use crate::error::ReconError;
use crate::model::Table;

/// Identifier normalization applied to every SKU and MSKU at load time.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComboComponent {
    pub sku: String,
    pub multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("SKU '{0}' not found in catalog")]
    NotFound(String),
    #[error("combo '{0}' has no registered expansion")]
    UnknownCombo(String),
    #[error("quantity {quantity} x {multiplier} for '{sku}' overflows")]
    QuantityOverflow {
        sku: String,
        quantity: i64,
        multiplier: u32,
    },
}

/// SKU → MSKU mappings plus combo expansions. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
    sku_to_msku: HashMap<String, String>,
    known_mskus: HashSet<String>,
    combos: HashMap<String, Vec<ComboComponent>>,
}

impl MappingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from SKU tables (applied in order) and an optional combo table.
    pub fn from_tables(
        mappings: &[Table],
        combos: Option<&Table>,
        columns: &ReferenceColumns,
    ) -> Result<Self, ReconError> {
        let mut catalog = Self::new();
        for table in mappings {
            catalog.load_mapping_table(table, columns)?;
        }
        if let Some(table) = combos {
            catalog.load_combo_table(table, columns)?;
        }
        log::info!(
            "catalog: {} SKU mappings, {} combos",
            catalog.mapping_len(),
            catalog.combo_len()
        );
        Ok(catalog)
    }

    /// Insert one mapping; returns the MSKU it replaced, if any.
    pub fn insert_mapping(&mut self, sku: &str, msku: &str) -> Option<String> {
        let msku = normalize_id(msku);
        self.known_mskus.insert(msku.clone());
        self.sku_to_msku.insert(normalize_id(sku), msku)
    }

    /// Add a component to a combo. A component already present gets its
    /// multiplier increased instead of a second entry.
    pub fn insert_combo_component(&mut self, combo: &str, sku: &str, multiplier: u32) {
        let combo = normalize_id(combo);
        let sku = normalize_id(sku);
        self.known_mskus.insert(combo.clone());
        let components = self.combos.entry(combo).or_default();
        match components.iter_mut().find(|c| c.sku == sku) {
            Some(existing) => existing.multiplier += multiplier,
            None => components.push(ComboComponent { sku, multiplier }),
        }
    }

    pub fn load_mapping_table(
        &mut self,
        table: &Table,
        columns: &ReferenceColumns,
    ) -> Result<usize, ReconError> {
        let sku_col = require_column(table, &columns.sku)?;
        let msku_col = require_column(table, &columns.msku)?;

        let mut loaded = 0;
        for (i, row) in table.rows.iter().enumerate() {
            let sku = row.get(sku_col).map(|s| s.trim()).unwrap_or("");
            let msku = row.get(msku_col).map(|s| s.trim()).unwrap_or("");
            if sku.is_empty() || msku.is_empty() {
                log::debug!("{}: row {i} skipped (blank sku or msku)", table.name);
                continue;
            }
            if let Some(previous) = self.insert_mapping(sku, msku) {
                if previous != normalize_id(msku) {
                    log::warn!(
                        "{}: SKU '{sku}' remapped from '{previous}' to '{}'",
                        table.name,
                        normalize_id(msku)
                    );
                }
            }
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Load a combo table in either layout: long (`combo`, `component`,
    /// optional `multiplier`) or wide (`combo`, `SKU1` ... `SKUn`).
    pub fn load_combo_table(
        &mut self,
        table: &Table,
        columns: &ReferenceColumns,
    ) -> Result<usize, ReconError> {
        let combo_col = require_column(table, &columns.combo)?;

        if let Some(component_col) = table.find_column(&columns.component) {
            let multiplier_col = table.find_column(&columns.multiplier);
            let mut loaded = 0;
            for (i, row) in table.rows.iter().enumerate() {
                let combo = row.get(combo_col).map(|s| s.trim()).unwrap_or("");
                let component = row.get(component_col).map(|s| s.trim()).unwrap_or("");
                if combo.is_empty() || component.is_empty() {
                    log::debug!("{}: row {i} skipped (blank combo or component)", table.name);
                    continue;
                }
                let raw = multiplier_col
                    .and_then(|c| row.get(c))
                    .map(|s| s.as_str())
                    .unwrap_or("");
                let multiplier = parse_multiplier(raw).map_err(|reason| ReconError::BadReferenceValue {
                    table: table.name.clone(),
                    row: i,
                    value: raw.to_string(),
                    reason,
                })?;
                self.insert_combo_component(combo, component, multiplier);
                loaded += 1;
            }
            return Ok(loaded);
        }

        let wide = numbered_columns(table, &columns.component_prefix);
        if wide.is_empty() {
            return Err(ReconError::MissingColumn {
                table: table.name.clone(),
                column: format!("{} (or {}1..{}N)", columns.component, columns.component_prefix, columns.component_prefix),
            });
        }

        let mut loaded = 0;
        for (i, row) in table.rows.iter().enumerate() {
            let combo = row.get(combo_col).map(|s| s.trim()).unwrap_or("");
            if combo.is_empty() {
                log::debug!("{}: row {i} skipped (blank combo)", table.name);
                continue;
            }
            for col in &wide {
                let component = row.get(*col).map(|s| s.trim()).unwrap_or("");
                if !component.is_empty() {
                    self.insert_combo_component(combo, component, 1);
                    loaded += 1;
                }
            }
        }
        Ok(loaded)
    }

    /// Exact lookup after normalization.
    pub fn resolve(&self, sku: &str) -> Result<&str, LookupError> {
        let key = normalize_id(sku);
        self.sku_to_msku
            .get(&key)
            .map(|m| m.as_str())
            .ok_or(LookupError::NotFound(key))
    }

    pub fn is_combo(&self, msku: &str) -> bool {
        self.combos.contains_key(&normalize_id(msku))
    }

    /// True when `id` is a mapped MSKU value or a combo key.
    pub fn is_known_msku(&self, id: &str) -> bool {
        self.known_mskus.contains(&normalize_id(id))
    }

    pub fn components(&self, combo: &str) -> Option<&[ComboComponent]> {
        self.combos.get(&normalize_id(combo)).map(|c| c.as_slice())
    }

    /// Component SKUs with `quantity × multiplier`, in catalog order.
    pub fn expand(&self, combo: &str, quantity: i64) -> Result<Vec<(String, i64)>, LookupError> {
        let key = normalize_id(combo);
        let components = self
            .combos
            .get(&key)
            .ok_or_else(|| LookupError::UnknownCombo(key.clone()))?;

        components
            .iter()
            .map(|c| {
                quantity
                    .checked_mul(i64::from(c.multiplier))
                    .map(|q| (c.sku.clone(), q))
                    .ok_or_else(|| LookupError::QuantityOverflow {
                        sku: c.sku.clone(),
                        quantity,
                        multiplier: c.multiplier,
                    })
            })
            .collect()
    }

    pub fn mapping_len(&self) -> usize {
        self.sku_to_msku.len()
    }

    pub fn combo_len(&self) -> usize {
        self.combos.len()
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sku_to_msku.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn require_column<'a>(table: &'a Table, name: &str) -> Result<&'a str, ReconError> {
    table.find_column(name).ok_or_else(|| ReconError::MissingColumn {
        table: table.name.clone(),
        column: name.to_string(),
    })
}

/// Headers shaped `<prefix><n>` (e.g. `SKU1`, `sku 12`), ordered by `n`.
fn numbered_columns<'a>(table: &'a Table, prefix: &str) -> Vec<&'a str> {
    let prefix = prefix.trim().to_lowercase();
    let mut found: Vec<(u32, &str)> = table
        .headers
        .iter()
        .filter_map(|h| {
            let lowered = h.trim().to_lowercase();
            let rest = lowered.strip_prefix(&prefix)?.trim();
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            rest.parse::<u32>().ok().map(|n| (n, h.as_str()))
        })
        .collect();
    found.sort_by_key(|(n, _)| *n);
    found.into_iter().map(|(_, h)| h).collect()
}

/// Parse a per-unit multiplier. Blank means 1; `2.0` is accepted, `1.5` is not.
fn parse_multiplier(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(1);
    }
    let value: i64 = match raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f: f64 = raw
                .parse()
                .map_err(|_| "multiplier is not a number".to_string())?;
            if !f.is_finite() || f.fract() != 0.0 {
                return Err("fractional multiplier".into());
            }
            f as i64
        }
    };
    if value < 1 {
        return Err("multiplier must be at least 1".into());
    }
    u32::try_from(value).map_err(|_| "multiplier too large".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
