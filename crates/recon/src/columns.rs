//! Column-role detection.
//!
//! Sales exports from different marketplaces name the same column in many
//! ways ("Order ID", "Sub Order No", "order_id"...). Each semantic [`Role`]
//! owns a ranked list of substring patterns split into three [`Tier`]s.
//! Classification runs tier by tier across all roles, so a specific pattern
//! for one role always beats a generic pattern for another.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ColumnsConfig;

// ---------------------------------------------------------------------------
// Roles + Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OrderId,
    Date,
    Sku,
    Quantity,
}

impl Role {
    pub const ALL: [Role; 4] = [Self::OrderId, Self::Date, Self::Sku, Self::Quantity];

    /// Order in which roles pick columns within one tier.
    pub const EVALUATION_ORDER: [Role; 4] = [Self::Date, Self::Sku, Self::Quantity, Self::OrderId];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderId => "order_id",
            Self::Date => "date",
            Self::Sku => "sku",
            Self::Quantity => "quantity",
        }
    }

    /// Rows cannot be reconciled without these.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Sku | Self::Quantity)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class of a pattern. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Exact id tokens: `order_id`, `seller sku`, `quantity`.
    Exact,
    /// Domain-qualified partials: `invoice no`, `transaction id`, `asin`.
    Domain,
    /// Generic single words: `order`, `product`, `count`.
    Generic,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Self::Exact, Self::Domain, Self::Generic];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Domain => write!(f, "domain"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternRule {
    pub role: Role,
    /// Stored lowercased; matched as a substring of the lowercased header.
    pub pattern: String,
    pub tier: Tier,
    pub priority: i32,
}

impl PatternRule {
    pub fn new(role: Role, pattern: &str, tier: Tier, priority: i32) -> Self {
        Self {
            role,
            pattern: pattern.trim().to_lowercase(),
            tier,
            priority,
        }
    }

    pub fn matches(&self, lowered_header: &str) -> bool {
        lowered_header.contains(&self.pattern)
    }
}

use Role::{Date, OrderId, Quantity, Sku};
use Tier::{Domain, Exact, Generic};

/// Built-in pattern corpus. Within a (role, tier) higher priority runs first.
const BUILTIN_RULES: &[(Role, Tier, i32, &str)] = &[
    // order id
    (OrderId, Exact, 100, "sub order no"),
    (OrderId, Exact, 100, "sub_order_no"),
    (OrderId, Exact, 100, "suborder_id"),
    (OrderId, Exact, 90, "order_id"),
    (OrderId, Exact, 90, "orderid"),
    (OrderId, Exact, 90, "order id"),
    (OrderId, Exact, 90, "order-id"),
    (OrderId, Exact, 80, "order no"),
    (OrderId, Exact, 80, "order_no"),
    (OrderId, Exact, 80, "order number"),
    (OrderId, Exact, 80, "ordernumber"),
    (OrderId, Exact, 70, "order #"),
    (OrderId, Exact, 70, "order#"),
    (OrderId, Domain, 80, "invoice_id"),
    (OrderId, Domain, 80, "invoice id"),
    (OrderId, Domain, 80, "invoice no"),
    (OrderId, Domain, 80, "invoice number"),
    (OrderId, Domain, 70, "transaction_id"),
    (OrderId, Domain, 70, "transaction id"),
    (OrderId, Domain, 70, "txn_id"),
    (OrderId, Domain, 60, "purchase_id"),
    (OrderId, Domain, 60, "purchase id"),
    (OrderId, Domain, 60, "purchase order"),
    (OrderId, Domain, 50, "sale_id"),
    (OrderId, Domain, 50, "sale id"),
    (OrderId, Domain, 50, "sales order"),
    (OrderId, Domain, 40, "shipment_id"),
    (OrderId, Domain, 40, "shipment id"),
    (OrderId, Generic, 30, "order"),
    (OrderId, Generic, 20, "invoice"),
    (OrderId, Generic, 20, "transaction"),
    (OrderId, Generic, 10, "reference"),
    (OrderId, Generic, 10, "receipt"),
    // date
    (Date, Exact, 100, "order date"),
    (Date, Exact, 100, "order_date"),
    (Date, Exact, 100, "orderdate"),
    (Date, Exact, 90, "invoice date"),
    (Date, Exact, 90, "invoice_date"),
    (Date, Exact, 90, "transaction date"),
    (Date, Exact, 90, "sale date"),
    (Date, Exact, 50, "date"),
    (Date, Domain, 60, "purchase date"),
    (Date, Domain, 50, "created at"),
    (Date, Domain, 50, "created_at"),
    (Date, Domain, 40, "shipped on"),
    (Date, Domain, 40, "timestamp"),
    (Date, Generic, 20, "created"),
    (Date, Generic, 10, "time"),
    (Date, Generic, 10, "day"),
    (Date, Generic, 10, "period"),
    // sku / msku
    (Sku, Exact, 100, "msku"),
    (Sku, Exact, 100, "master sku"),
    (Sku, Exact, 90, "seller sku"),
    (Sku, Exact, 90, "seller_sku"),
    (Sku, Exact, 90, "sellersku"),
    (Sku, Exact, 80, "sku id"),
    (Sku, Exact, 80, "sku_id"),
    (Sku, Exact, 80, "sku code"),
    (Sku, Exact, 50, "sku"),
    (Sku, Domain, 60, "product id"),
    (Sku, Domain, 60, "product_id"),
    (Sku, Domain, 50, "item id"),
    (Sku, Domain, 50, "item_id"),
    (Sku, Domain, 40, "asin"),
    (Sku, Domain, 40, "fsn"),
    (Sku, Domain, 30, "style code"),
    (Sku, Generic, 20, "product"),
    (Sku, Generic, 10, "item"),
    (Sku, Generic, 10, "style"),
    // quantity
    (Quantity, Exact, 100, "quantity"),
    (Quantity, Exact, 90, "qty"),
    (Quantity, Exact, 80, "units sold"),
    (Quantity, Exact, 80, "units_sold"),
    (Quantity, Domain, 60, "ordered units"),
    (Quantity, Domain, 50, "units"),
    (Quantity, Domain, 40, "pieces"),
    (Quantity, Domain, 40, "pcs"),
    (Quantity, Generic, 10, "count"),
];

/// Ranked pattern rules, kept sorted by (tier, descending priority).
/// Equal keys keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.extend(
            BUILTIN_RULES
                .iter()
                .map(|&(role, tier, priority, pattern)| PatternRule::new(role, pattern, tier, priority)),
        );
        set
    }

    /// Built-in corpus (unless `replace_defaults`) plus configured rules.
    pub fn from_config(config: &ColumnsConfig) -> Self {
        let mut set = if config.replace_defaults {
            Self::empty()
        } else {
            Self::builtin()
        };
        set.extend(
            config
                .rules
                .iter()
                .map(|r| PatternRule::new(r.role, &r.pattern, r.tier, r.priority)),
        );
        set
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = PatternRule>) {
        self.rules.extend(rules);
        self.rules
            .sort_by_key(|r| (r.tier, std::cmp::Reverse(r.priority)));
    }

    pub fn rules_for(&self, role: Role, tier: Tier) -> impl Iterator<Item = &PatternRule> {
        self.rules
            .iter()
            .filter(move |r| r.role == role && r.tier == tier)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Which header a role landed on, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnAssignment {
    pub role: Role,
    pub header: Option<String>,
    /// Header name the role was pinned to in config, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl ColumnAssignment {
    fn unassigned(role: Role) -> Self {
        Self {
            role,
            header: None,
            pinned: None,
            pattern: None,
            tier: None,
        }
    }
}

/// Role assignments for one input table, one entry per [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnRoleMap {
    assignments: Vec<ColumnAssignment>,
}

impl ColumnRoleMap {
    pub fn header(&self, role: Role) -> Option<&str> {
        self.get(role).and_then(|a| a.header.as_deref())
    }

    pub fn get(&self, role: Role) -> Option<&ColumnAssignment> {
        self.assignments.iter().find(|a| a.role == role)
    }

    /// Reverse lookup: the role a raw header was assigned to.
    pub fn role_of(&self, header: &str) -> Option<Role> {
        self.assignments
            .iter()
            .find(|a| a.header.as_deref() == Some(header))
            .map(|a| a.role)
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &ColumnAssignment> {
        self.assignments.iter().filter(|a| a.header.is_none())
    }

    pub fn assignments(&self) -> &[ColumnAssignment] {
        &self.assignments
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    rules: RuleSet,
    pinned: BTreeMap<Role, String>,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}

impl ColumnClassifier {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            pinned: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ColumnsConfig) -> Self {
        Self {
            rules: RuleSet::from_config(config),
            pinned: config.pinned.clone(),
        }
    }

    pub fn pin(mut self, role: Role, header: impl Into<String>) -> Self {
        self.pinned.insert(role, header.into());
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Assign headers to roles. Pure; never fails.
    pub fn classify(&self, headers: &[String]) -> ColumnRoleMap {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let mut taken = vec![false; headers.len()];
        let mut found: BTreeMap<Role, ColumnAssignment> = BTreeMap::new();

        for (&role, wanted) in &self.pinned {
            let mut assignment = ColumnAssignment::unassigned(role);
            assignment.pinned = Some(wanted.clone());
            let hit = (0..headers.len())
                .find(|&i| !taken[i] && headers[i].trim().eq_ignore_ascii_case(wanted.trim()));
            if let Some(i) = hit {
                taken[i] = true;
                assignment.header = Some(headers[i].clone());
            } else {
                log::debug!("pinned column '{wanted}' for role {role} not present");
            }
            found.insert(role, assignment);
        }

        for tier in Tier::ALL {
            for role in Role::EVALUATION_ORDER {
                if found.contains_key(&role) {
                    continue;
                }
                for rule in self.rules.rules_for(role, tier) {
                    let hit = (0..headers.len()).find(|&i| !taken[i] && rule.matches(&lowered[i]));
                    if let Some(i) = hit {
                        taken[i] = true;
                        log::debug!(
                            "column '{}' -> {role} ({tier} pattern '{}')",
                            headers[i],
                            rule.pattern
                        );
                        found.insert(
                            role,
                            ColumnAssignment {
                                role,
                                header: Some(headers[i].clone()),
                                pinned: None,
                                pattern: Some(rule.pattern.clone()),
                                tier: Some(tier),
                            },
                        );
                        break;
                    }
                }
            }
        }

        let assignments = Role::ALL
            .iter()
            .map(|&role| {
                found
                    .remove(&role)
                    .unwrap_or_else(|| ColumnAssignment::unassigned(role))
            })
            .collect();

        ColumnRoleMap { assignments }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
