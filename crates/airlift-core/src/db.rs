use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("table has no usable primary key: {0}")]
    NoPrimaryKey(String),

    #[error("database execution failed: {0}")]
    Execution(String),

    #[error("table snapshot error: {0}")]
    Snapshot(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// One row as ordered column/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

impl TableRow {
    pub fn new(columns: Vec<String>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }
}

/// Read and write surface the transfer engine needs from a site database.
///
/// Implementations adapt whatever actually holds the site's tables. The
/// engine only ever introspects rows for export and applies whole scripts
/// on import; it never builds queries beyond that.
pub trait TableSource {
    fn tables(&self) -> DbResult<Vec<String>>;

    fn row_count(&self, table: &str) -> DbResult<u64>;

    /// The column used to select row subsets for export.
    fn primary_key(&self, table: &str) -> DbResult<String>;

    /// The `CREATE TABLE` statement for the table, without a trailing
    /// semicolon.
    fn create_statement(&self, table: &str) -> DbResult<String>;

    fn all_rows(&self, table: &str) -> DbResult<Vec<TableRow>>;

    /// Rows whose primary-key value is in `keys`, in table order.
    fn rows_by_keys(&self, table: &str, keys: &[String]) -> DbResult<Vec<TableRow>>;

    /// Applies a SQL script atomically: either every statement takes effect
    /// or none do.
    fn apply_script(&self, sql: &str) -> DbResult<()>;
}

/// Declarative snapshot of one table, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub create_statement: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, TableSnapshot>,
    applied: Vec<String>,
    fail_applies: bool,
}

/// In-memory [`TableSource`] backed by [`TableSnapshot`]s.
///
/// Applied scripts are recorded rather than executed, which is what tests
/// and the CLI's snapshot mode need; a real deployment implements
/// [`TableSource`] against its live database instead.
#[derive(Default)]
pub struct MemoryTables {
    state: Mutex<MemoryState>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&self, snapshot: TableSnapshot) {
        if let Ok(mut state) = self.state.lock() {
            state.tables.insert(snapshot.name.clone(), snapshot);
        }
    }

    /// Loads snapshots from a JSON array of [`TableSnapshot`] objects.
    pub fn from_json_str(json: &str) -> DbResult<Self> {
        let snapshots: Vec<TableSnapshot> =
            serde_json::from_str(json).map_err(|e| DbError::Snapshot(e.to_string()))?;

        let tables = Self::new();
        for snapshot in snapshots {
            tables.insert_table(snapshot);
        }
        Ok(tables)
    }

    pub fn from_json_file(path: &Path) -> DbResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DbError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Scripts passed to [`TableSource::apply_script`], oldest first.
    pub fn applied_scripts(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.applied.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Makes every later `apply_script` call fail, for failure-path tests.
    pub fn fail_applies(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_applies = fail;
        }
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&TableSnapshot) -> T) -> DbResult<T> {
        match self.state.lock() {
            Ok(state) => state
                .tables
                .get(table)
                .map(f)
                .ok_or_else(|| DbError::UnknownTable(table.to_string())),
            Err(_) => Err(DbError::Execution("table state lock poisoned".into())),
        }
    }
}

impl TableSource for MemoryTables {
    fn tables(&self) -> DbResult<Vec<String>> {
        match self.state.lock() {
            Ok(state) => Ok(state.tables.keys().cloned().collect()),
            Err(_) => Err(DbError::Execution("table state lock poisoned".into())),
        }
    }

    fn row_count(&self, table: &str) -> DbResult<u64> {
        self.with_table(table, |t| t.rows.len() as u64)
    }

    fn primary_key(&self, table: &str) -> DbResult<String> {
        let key = self.with_table(table, |t| t.primary_key.clone())?;
        if key.is_empty() {
            return Err(DbError::NoPrimaryKey(table.to_string()));
        }
        Ok(key)
    }

    fn create_statement(&self, table: &str) -> DbResult<String> {
        self.with_table(table, |t| t.create_statement.clone())
    }

    fn all_rows(&self, table: &str) -> DbResult<Vec<TableRow>> {
        self.with_table(table, |t| {
            t.rows
                .iter()
                .map(|values| TableRow::new(t.columns.clone(), values.clone()))
                .collect()
        })
    }

    fn rows_by_keys(&self, table: &str, keys: &[String]) -> DbResult<Vec<TableRow>> {
        let key_column = self.primary_key(table)?;
        self.with_table(table, |t| {
            let key_index = t.columns.iter().position(|c| *c == key_column);
            t.rows
                .iter()
                .filter(|values| match key_index {
                    Some(i) => keys.contains(&values[i]),
                    None => false,
                })
                .map(|values| TableRow::new(t.columns.clone(), values.clone()))
                .collect()
        })
    }

    fn apply_script(&self, sql: &str) -> DbResult<()> {
        match self.state.lock() {
            Ok(mut state) => {
                if state.fail_applies {
                    return Err(DbError::Execution("simulated apply failure".into()));
                }
                state.applied.push(sql.to_string());
                Ok(())
            }
            Err(_) => Err(DbError::Execution("table state lock poisoned".into())),
        }
    }
}
