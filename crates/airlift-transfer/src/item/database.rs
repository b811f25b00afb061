//! Database table items.

use serde_json::Value;

use crate::context::TransferContext;
use crate::error::{Result, TransferError};
use crate::protocol::{ArrivalRequest, HEADER_PREFIX, HEADER_TABLE};
use crate::sql;

/// Which rows of a table travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelector {
    /// Table structure plus every row.
    All,
    /// Only rows with these primary-key values; the structure stays as it
    /// is on the arrival site.
    Keys(Vec<String>),
}

/// A database table, transported as a SQL script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseItem {
    table: String,
    rows: RowSelector,
}

impl DatabaseItem {
    pub fn new(table: impl Into<String>, rows: RowSelector) -> Self {
        Self {
            table: table.into(),
            rows,
        }
    }

    pub(crate) fn from_raw(raw: &Value) -> Result<Self> {
        match raw {
            Value::String(table) => Ok(Self::new(table.clone(), RowSelector::All)),
            Value::Object(map) => {
                let table = map.get("table").and_then(Value::as_str).ok_or_else(|| {
                    TransferError::BadItem(
                        "database item descriptor needs a \"table\" string".into(),
                    )
                })?;
                let rows = match map.get("rows") {
                    None => RowSelector::All,
                    Some(Value::Number(n)) if n.as_i64() == Some(-1) => RowSelector::All,
                    Some(Value::Array(keys)) => {
                        RowSelector::Keys(keys.iter().map(raw_key).collect::<Result<Vec<_>>>()?)
                    }
                    Some(_) => {
                        return Err(TransferError::BadItem(
                            "database item \"rows\" must be -1 or an array of keys".into(),
                        ))
                    }
                };
                Ok(Self::new(table, rows))
            }
            _ => Err(TransferError::BadItem(
                "database item descriptor must be a table name or an object".into(),
            )),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn rows(&self) -> &RowSelector {
        &self.rows
    }

    pub fn can_send(&self, ctx: &TransferContext) -> bool {
        ctx.tables
            .tables()
            .map(|names| names.iter().any(|n| n == &self.table))
            .unwrap_or(false)
    }

    /// The arrival site needs the sender's prefix to rewrite table names.
    pub fn headers(&self, ctx: &TransferContext) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_TABLE, self.table.clone()),
            (HEADER_PREFIX, ctx.settings.site.table_prefix.clone()),
        ]
    }

    pub fn body(&self, ctx: &TransferContext) -> Result<Vec<u8>> {
        Ok(sql::export_table(ctx, &self.table, &self.rows)?.into_bytes())
    }

    /// Arrival side: rewrites the sender's prefix to the local one and
    /// applies the script.
    pub fn import(request: &ArrivalRequest, ctx: &TransferContext) -> Result<()> {
        let from_prefix = request.require_header(HEADER_PREFIX)?;
        let script = std::str::from_utf8(request.body())
            .map_err(|e| TransferError::Sql(format!("script is not valid utf-8: {e}")))?;
        sql::import_table(ctx, script, from_prefix)
    }
}

fn raw_key(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(TransferError::BadItem(
            "row keys must be strings or numbers".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_descriptor_forms() {
        let all = DatabaseItem::from_raw(&json!("wp_posts")).unwrap();
        assert_eq!(all.table(), "wp_posts");
        assert_eq!(*all.rows(), RowSelector::All);

        let all_explicit = DatabaseItem::from_raw(&json!({"table": "wp_posts", "rows": -1})).unwrap();
        assert_eq!(*all_explicit.rows(), RowSelector::All);

        let subset = DatabaseItem::from_raw(&json!({"table": "wp_posts", "rows": [3, "7"]})).unwrap();
        assert_eq!(
            *subset.rows(),
            RowSelector::Keys(vec!["3".to_string(), "7".to_string()])
        );
    }

    #[test]
    fn test_bad_descriptors_are_rejected() {
        assert_eq!(
            DatabaseItem::from_raw(&json!(42)).unwrap_err().code(),
            "INVALID_ITEM"
        );
        assert_eq!(
            DatabaseItem::from_raw(&json!({"rows": -1})).unwrap_err().code(),
            "INVALID_ITEM"
        );
        assert_eq!(
            DatabaseItem::from_raw(&json!({"table": "t", "rows": "all"}))
                .unwrap_err()
                .code(),
            "INVALID_ITEM"
        );
    }
}
