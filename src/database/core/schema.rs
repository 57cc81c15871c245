//! Database schema management
//!
//! This module holds the registry's table and index definitions and the
//! bootstrap sequence that creates them. Every statement is `IF NOT EXISTS`,
//! so bootstrapping an already initialized database is a no-op.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Schema definitions for all tables in the registry database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the patients table
    pub const PATIENTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL CHECK (length(first_name) <= 100),
            last_name TEXT NOT NULL CHECK (length(last_name) <= 100),
            date_of_birth TEXT NOT NULL CHECK (date(date_of_birth) IS date_of_birth),
            gender TEXT NOT NULL CHECK (gender IN ('male', 'female', 'other')),
            address TEXT,
            phone TEXT CHECK (phone IS NULL OR length(phone) <= 20),
            email TEXT CHECK (email IS NULL OR length(email) <= 100),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
                CHECK (strftime('%Y-%m-%dT%H:%M:%f', created_at) IS created_at),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
                CHECK (strftime('%Y-%m-%dT%H:%M:%f', updated_at) IS updated_at)
        );
    "#;

    /// SQL for creating patient indexes
    pub const PATIENTS_INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name)",
        "CREATE INDEX IF NOT EXISTS idx_patients_dob ON patients(date_of_birth)",
    ];

    /// SQL for creating the audit log table (declared, not written to)
    pub const AUDIT_LOG_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL CHECK (length(action) <= 20),
            table_name TEXT NOT NULL CHECK (length(table_name) <= 50),
            record_id INTEGER,
            changed_by TEXT CHECK (changed_by IS NULL OR length(changed_by) <= 100),
            changes TEXT,
            action_timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
        );
    "#;

    /// Tables that must exist after bootstrap
    pub const REQUIRED_TABLES: &'static [&'static str] = &["patients", "audit_log"];

    /// Indexes that must exist after bootstrap
    pub const REQUIRED_INDEXES: &'static [&'static str] = &["idx_patients_name", "idx_patients_dob"];
}

/// Schema manager for the registry database
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run the bootstrap sequence
    ///
    /// Creates the patients table, its two indexes and the audit log table,
    /// in that order.
    pub fn bootstrap(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::PATIENTS_TABLE, [])
            .map_err(|e| anyhow!("Failed to create patients table: {}", e))?;

        for index_sql in SchemaDefinitions::PATIENTS_INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create patients index: {}", e))?;
        }

        self.conn
            .execute(SchemaDefinitions::AUDIT_LOG_TABLE, [])
            .map_err(|e| anyhow!("Failed to create audit_log table: {}", e))?;

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let mut missing = Vec::new();

        for table in SchemaDefinitions::REQUIRED_TABLES {
            if !self.object_exists("table", table)? {
                missing.push(table.to_string());
            }
        }
        for index in SchemaDefinitions::REQUIRED_INDEXES {
            if !self.object_exists("index", index)? {
                missing.push(index.to_string());
            }
        }

        let expected =
            SchemaDefinitions::REQUIRED_TABLES.len() + SchemaDefinitions::REQUIRED_INDEXES.len();
        Ok(match missing.len() {
            0 => SchemaStatus::Current,
            n if n == expected => SchemaStatus::NotInitialized,
            _ => SchemaStatus::Incomplete { missing },
        })
    }

    /// Count the registry's schema objects by name
    ///
    /// Used to confirm bootstrap never creates duplicates.
    pub fn schema_objects(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT type, name FROM sqlite_master \
                 WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
            )
            .map_err(|e| anyhow!("Failed to list schema objects: {}", e))?;

        let objects = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| anyhow!("Failed to list schema objects: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read schema object: {}", e))?;

        Ok(objects)
    }

    fn object_exists(&self, kind: &str, name: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                [kind, name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check {} '{}': {}", kind, name, e))?;
        Ok(count > 0)
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Some schema objects are missing
    Incomplete { missing: Vec<String> },
}
