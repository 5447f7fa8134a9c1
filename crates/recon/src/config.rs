use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::columns::{Role, Tier};
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration, usually read from a `.skumap.toml` file.
///
/// Every section is optional: `ReconConfig::default()` runs with the
/// built-in column patterns, reject-on-shortfall stock policy and the
/// conventional reference column names.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// chrono formats tried, in order, to normalize sales dates to ISO.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub files: Option<FilesConfig>,
    #[serde(default)]
    pub stock: StockConfig,
    #[serde(default)]
    pub quantity: QuantityConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub reference: ReferenceColumns,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            date_formats: default_date_formats(),
            files: None,
            stock: StockConfig::default(),
            quantity: QuantityConfig::default(),
            columns: ColumnsConfig::default(),
            reference: ReferenceColumns::default(),
        }
    }
}

fn default_name() -> String {
    "skumap".into()
}

fn default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d/%m/%Y",
        "%d-%b-%Y",
        "%d %b %Y",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Where the CLI finds its tables. Paths are relative to the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesConfig {
    #[serde(default)]
    pub mappings: Vec<SourceSpec>,
    #[serde(default)]
    pub combos: Option<SourceSpec>,
    #[serde(default)]
    pub inventory: Option<SourceSpec>,
    #[serde(default)]
    pub sales: Option<SourceSpec>,
}

/// A table source: a bare path, or a workbook sheet with an optional
/// header cell used to locate the header row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Path(String),
    Sheet {
        path: String,
        #[serde(default)]
        sheet: Option<String>,
        #[serde(default)]
        header: Option<String>,
    },
}

impl SourceSpec {
    pub fn path(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::Sheet { path, .. } => path,
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Sheet { sheet, .. } => sheet.as_deref(),
        }
    }

    pub fn header(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Sheet { header, .. } => header.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stock + Quantity
// ---------------------------------------------------------------------------

/// What happens when a sale needs more units than the ledger holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Mark the row `stock-shortfall` and leave stock untouched.
    #[default]
    Reject,
    /// Apply the decrement, keep the row `ok`, emit a warning entry.
    AllowNegative,
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::AllowNegative => write!(f, "allow_negative"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockConfig {
    #[serde(default)]
    pub policy: StockPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuantityConfig {
    #[serde(default = "default_true")]
    pub reject_non_positive: bool,
}

impl Default for QuantityConfig {
    fn default() -> Self {
        Self {
            reject_non_positive: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Column roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnsConfig {
    /// Drop the built-in pattern corpus and use only `rules`.
    #[serde(default)]
    pub replace_defaults: bool,
    /// Role pinned to a literal header name, bypassing pattern matching.
    #[serde(default)]
    pub pinned: BTreeMap<Role, String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub role: Role,
    pub pattern: String,
    pub tier: Tier,
    #[serde(default)]
    pub priority: i32,
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

/// Column names in the reference tables, matched ignoring case and padding.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceColumns {
    #[serde(default = "default_sku")]
    pub sku: String,
    #[serde(default = "default_msku")]
    pub msku: String,
    #[serde(default = "default_combo")]
    pub combo: String,
    #[serde(default = "default_component")]
    pub component: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: String,
    /// Prefix of the numbered component columns in a wide combo table
    /// (`SKU1`, `SKU2`, ...).
    #[serde(default = "default_sku")]
    pub component_prefix: String,
    #[serde(default = "default_stock")]
    pub stock: String,
    #[serde(default = "default_true")]
    pub combos_required: bool,
}

impl Default for ReferenceColumns {
    fn default() -> Self {
        Self {
            sku: default_sku(),
            msku: default_msku(),
            combo: default_combo(),
            component: default_component(),
            multiplier: default_multiplier(),
            component_prefix: default_sku(),
            stock: default_stock(),
            combos_required: true,
        }
    }
}

fn default_sku() -> String {
    "sku".into()
}
fn default_msku() -> String {
    "msku".into()
}
fn default_combo() -> String {
    "combo".into()
}
fn default_component() -> String {
    "component".into()
}
fn default_multiplier() -> String {
    "multiplier".into()
}
fn default_stock() -> String {
    "stock".into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.date_formats.iter().any(|f| f.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "date_formats must not contain empty entries".into(),
            ));
        }

        for (i, rule) in self.columns.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "columns.rules[{i}] ({}): pattern must not be empty",
                    rule.role
                )));
            }
        }

        for (role, header) in &self.columns.pinned {
            if header.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "columns.pinned.{role}: header must not be empty"
                )));
            }
        }

        if self.columns.replace_defaults && self.columns.rules.is_empty() && self.columns.pinned.is_empty() {
            return Err(ReconError::ConfigValidation(
                "columns.replace_defaults requires at least one rule or pinned column".into(),
            ));
        }

        let r = &self.reference;
        let names = [
            ("sku", &r.sku),
            ("msku", &r.msku),
            ("combo", &r.combo),
            ("component", &r.component),
            ("multiplier", &r.multiplier),
            ("component_prefix", &r.component_prefix),
            ("stock", &r.stock),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "reference.{key} must not be empty"
                )));
            }
        }

        if let Some(files) = &self.files {
            let specs = files
                .mappings
                .iter()
                .chain(files.combos.iter())
                .chain(files.inventory.iter())
                .chain(files.sales.iter());
            for spec in specs {
                if spec.path().trim().is_empty() {
                    return Err(ReconError::ConfigValidation(
                        "files: source path must not be empty".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
