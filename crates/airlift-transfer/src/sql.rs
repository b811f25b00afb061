//! SQL script generation for export and script application for import.

use airlift_core::{restore_settings, snapshot_settings, TableRow, ValueRewrite};

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::item::RowSelector;

/// Statement heads behind which a table name appears in generated scripts.
///
/// Prefix rewriting touches only these spots, so row values that happen to
/// contain the prefix text survive unchanged.
const PREFIXED_STATEMENT_HEADS: [&str; 3] = ["DROP TABLE `", "CREATE TABLE `", "INSERT INTO `"];

/// Builds the SQL script for one table.
///
/// A full export drops and recreates the table before the row inserts; a
/// keyed subset carries only inserts and leaves the structure on the
/// arrival site as it is. Rows vetoed by the export row checkpoint are
/// dropped silently.
pub fn export_table(ctx: &TransferContext, table: &str, rows: &RowSelector) -> Result<String> {
    let mut script = String::new();

    let selected = match rows {
        RowSelector::All => {
            script.push_str(&format!("DROP TABLE `{table}`;\n\n"));
            script.push_str(&ctx.tables.create_statement(table)?);
            script.push_str(";\n");
            ctx.tables.all_rows(table)?
        }
        RowSelector::Keys(keys) => ctx.tables.rows_by_keys(table, keys)?,
    };

    for row in &selected {
        if !ctx.hooks.allow_export_row(row, table, ctx) {
            continue;
        }
        script.push('\n');
        script.push_str(&insert_statement(table, row, ctx.settings.rewrite.as_ref()));
        script.push('\n');
    }

    Ok(script)
}

fn insert_statement(table: &str, row: &TableRow, rewrite: Option<&ValueRewrite>) -> String {
    let values: Vec<String> = row
        .values
        .iter()
        .map(|v| {
            // Cell rewriting happens before escaping so the configured
            // pattern is matched against the raw value.
            let rewritten = match rewrite {
                Some(r) if !r.find.is_empty() => v.replace(&r.find, &r.replace),
                _ => v.clone(),
            };
            format!("'{}'", escape_sql_value(&rewritten))
        })
        .collect();
    format!("INSERT INTO `{}` VALUES ({});", table, values.join(", "))
}

/// Escapes one value for inclusion in a single-quoted SQL literal.
pub fn escape_sql_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{1a}' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out
}

/// Rewrites the table prefix inside a transported script.
///
/// Replacement is textual: the prefix is swapped where it directly follows
/// one of the known statement heads. Table names that repeat inside row
/// data after such a head would be rewritten too; scripts built by
/// [`export_table`] keep row values on their own lines, which keeps the
/// rewrite anchored to statements in practice.
pub fn swap_table_prefix(script: &str, from: &str, to: &str) -> String {
    if from == to || from.is_empty() {
        return script.to_string();
    }

    let mut out = script.to_string();
    for head in PREFIXED_STATEMENT_HEADS {
        out = out.replace(
            &format!("{head}{from}"),
            &format!("{head}{to}"),
        );
    }
    out
}

/// Applies a transported script to the local database.
///
/// The sender's table prefix is rewritten to the local one first. The
/// engine's own settings are snapshotted before the script runs and written
/// back afterwards, whether or not the apply succeeds, so an imported
/// options table can not reconfigure this site.
pub fn import_table(ctx: &TransferContext, script: &str, from_prefix: &str) -> Result<()> {
    let local = swap_table_prefix(script, from_prefix, &ctx.settings.site.table_prefix);

    let saved = snapshot_settings(ctx.store);
    let outcome = ctx.tables.apply_script(&local);
    restore_settings(ctx.store, &saved);

    outcome.map_err(|e| TransferError::Sql(e.to_string()))
}
