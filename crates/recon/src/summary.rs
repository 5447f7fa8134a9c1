use std::collections::BTreeMap;

use crate::model::{LogEntry, ReconSummary, ReconciledRow, RowStatus, Severity};

/// Compute summary statistics from reconciled rows and the issue log.
pub fn compute_summary(input_rows: usize, rows: &[ReconciledRow], log: &[LogEntry]) -> ReconSummary {
    let mut status_counts: BTreeMap<String, usize> = RowStatus::ALL
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();
    let mut ok = 0;
    let mut units_decremented = 0i64;

    for r in rows {
        *status_counts.entry(r.status.to_string()).or_insert(0) += 1;
        if r.status == RowStatus::Ok {
            ok += 1;
            units_decremented = units_decremented.saturating_add(r.quantity.unwrap_or(0));
        }
    }

    ReconSummary {
        input_rows,
        output_rows: rows.len(),
        ok,
        excluded: rows.len() - ok,
        warnings: log.iter().filter(|e| e.severity == Severity::Warning).count(),
        units_decremented,
        status_counts,
    }
}
