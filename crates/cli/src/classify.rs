//! `skumap classify`: preview column-role assignment for a sales file.

use std::path::{Path, PathBuf};

use skumap_recon::columns::ColumnClassifier;

use crate::exit_codes::EXIT_ERROR;
use crate::recon::{load_config, load_source, source_from_arg};
use crate::CliError;

pub fn cmd_classify(sales: String, config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let (config, _) = load_config(config.as_deref())?;
    let table = load_source(Path::new(""), &source_from_arg(&sales))?;

    let map = ColumnClassifier::from_config(&config.columns).classify(&table.headers);

    if json {
        let json_str = serde_json::to_string_pretty(&map)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("{:<10} {:<32} MATCH", "ROLE", "HEADER");
    for a in map.assignments() {
        let header = a.header.as_deref().unwrap_or("-");
        let how = match (&a.pinned, &a.pattern, a.tier) {
            (Some(pinned), _, _) if a.header.is_some() => format!("pinned '{pinned}'"),
            (Some(pinned), _, _) => format!("pinned '{pinned}' (not found)"),
            (None, Some(pattern), Some(tier)) => format!("{tier} '{pattern}'"),
            _ => "unassigned".to_string(),
        };
        println!("{:<10} {:<32} {how}", a.role.as_str(), header);
    }

    let ignored: Vec<&str> = table
        .headers
        .iter()
        .filter(|h| map.role_of(h).is_none())
        .map(|h| h.as_str())
        .collect();
    if !ignored.is_empty() {
        println!("ignored: {}", ignored.join(", "));
    }
    Ok(())
}
