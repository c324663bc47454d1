//! Table DDL rendered from the projection table
//!
//! Each shard gets exactly the columns [`project`] says it materializes, so
//! reads and writes can never disagree with the physical tables.

use crate::database::projection::{project, EntityKind};
use crate::shard::Shard;

/// `CREATE TABLE IF NOT EXISTS` for one entity on one shard
pub fn create_table_statement(shard: Shard, kind: EntityKind) -> String {
    let set = project(shard, kind);
    let mut lines: Vec<String> = set
        .columns()
        .iter()
        .map(|c| format!("    {} {}", c.name, c.ty.sql_type()))
        .collect();
    lines.push(format!("    PRIMARY KEY ({})", kind.key_columns().join(", ")));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        kind.table(shard),
        lines.join(",\n")
    )
}

/// DDL for every entity on `shard`
pub fn create_table_statements(shard: Shard) -> Vec<String> {
    EntityKind::ALL
        .iter()
        .map(|kind| create_table_statement(shard, *kind))
        .collect()
}
