use std::collections::BTreeSet;

use akko_cache::{CacheManager, CachePolicy, PolicyTable, keys};
use anyhow::Result;
use colored::Colorize;

use crate::cli::OutputFormat;
use crate::output::{StatusRow, print_policies, print_status};

pub fn policies(table: &PolicyTable, format: OutputFormat) {
    let rows: Vec<CachePolicy> = table.policies().cloned().collect();
    print_policies(&rows, format);
}

/// Provision every known cache and report the layout it ended up with.
/// No hit counters: every CLI run starts with an empty manager.
pub async fn status(manager: &CacheManager, table: &PolicyTable) -> Result<()> {
    println!("{}: {:?}", "Mode".cyan(), manager.mode());
    let rows = status_rows(manager, table).await?;
    print_status(&rows);
    Ok(())
}

async fn status_rows(manager: &CacheManager, table: &PolicyTable) -> Result<Vec<StatusRow>> {
    let mut names: BTreeSet<String> = table.names().map(str::to_string).collect();
    names.extend(keys::names::ALL.iter().map(|name| name.to_string()));

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let cache = manager.get_cache(&name).await?;
        rows.push(StatusRow {
            key_prefix: table.policy_for(&name).key_prefix,
            layout: cache.layout_kind(),
            name,
        });
    }
    Ok(rows)
}
