//! Database connection management
//!
//! This module provides the SQLite connection wrapper that backs a registry
//! session, together with the statement executor used by the query interface.

use anyhow::{anyhow, Result};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::placeholders::bind_placeholders;

/// A single result row, keyed by column name in result order.
pub type Row = Map<String, JsonValue>;

/// Output of one statement executed through the query interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Ordered column names of the result (empty for non-returning statements)
    pub columns: Vec<String>,

    /// Result rows in engine order
    pub rows: Vec<Row>,

    /// Rows changed by a non-returning statement
    pub rows_affected: usize,
}

impl QueryResult {
    /// First row of the result, if any
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Whether the statement produced no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shape of a prepared statement, without executing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementInfo {
    pub column_count: usize,
    pub readonly: bool,
}

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Configure the database with the registry's pragmas
    fn configure(&self) -> Result<()> {
        // WAL lets a second process read while another writes
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| anyhow!("Failed to enable foreign keys: {}", e))?;

        // Another process may hold the write lock briefly
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;

        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Run a statement with positional `$N` parameters and collect its rows.
    ///
    /// Parameters are always bound by the engine; `$N` placeholders are
    /// rewritten to SQLite's numbered `?N` form before preparing.
    pub fn run(&self, sql: &str, params: &[Value]) -> rusqlite::Result<QueryResult> {
        let sql = bind_placeholders(sql);
        let mut stmt = self.conn.prepare(&sql)?;

        if stmt.column_count() == 0 {
            let rows_affected = stmt.execute(params_from_iter(params.iter()))?;
            return Ok(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected,
            });
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut record = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            rows.push(record);
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: 0,
        })
    }

    /// Prepare a statement and report its shape without running it
    pub fn describe(&self, sql: &str) -> rusqlite::Result<StatementInfo> {
        let sql = bind_placeholders(sql);
        let stmt = self.conn.prepare(&sql)?;
        Ok(StatementInfo {
            column_count: stmt.column_count(),
            readonly: stmt.readonly(),
        })
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }
}

/// Convert an engine value into its JSON representation
fn to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => JsonValue::from(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_table_exists() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
    }

    #[test]
    fn test_run_returns_columns_in_order() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (b TEXT, a INTEGER, c REAL)").unwrap();
        db.execute("INSERT INTO t VALUES ('x', 1, 2.5), (NULL, 2, NULL)")
            .unwrap();

        let result = db.run("SELECT b, a, c FROM t ORDER BY a", &[]).unwrap();
        assert_eq!(result.columns, vec!["b", "a", "c"]);
        assert_eq!(result.rows.len(), 2);

        let first = result.first().unwrap();
        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(first["b"], JsonValue::from("x"));
        assert_eq!(first["a"], JsonValue::from(1));
        assert_eq!(first["c"], JsonValue::from(2.5));
        assert!(result.rows[1]["b"].is_null());
    }

    #[test]
    fn test_run_binds_dollar_parameters() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (name TEXT, n INTEGER)").unwrap();

        let inserted = db
            .run(
                "INSERT INTO t (n, name) VALUES ($2, $1)",
                &[Value::from("Robert'); DROP TABLE t;--".to_string()), Value::from(7)],
            )
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        assert!(inserted.columns.is_empty());

        assert!(db.table_exists("t").unwrap());
        let result = db
            .run("SELECT name FROM t WHERE n = $1", &[Value::from(7)])
            .unwrap();
        assert_eq!(
            result.rows[0]["name"],
            JsonValue::from("Robert'); DROP TABLE t;--")
        );
    }

    #[test]
    fn test_run_rejects_wrong_parameter_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        assert!(db.run("SELECT n FROM t WHERE n = $1", &[]).is_err());
    }

    #[test]
    fn test_describe() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();

        let select = db.describe("SELECT n FROM t").unwrap();
        assert_eq!(select.column_count, 1);
        assert!(select.readonly);

        let insert = db.describe("INSERT INTO t (n) VALUES ($1)").unwrap();
        assert_eq!(insert.column_count, 0);
        assert!(!insert.readonly);
    }
}
