//! Database module
//!
//! This module provides all database functionality for the registry, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connection, schema bootstrap, query results)
//! - **session**: The lazily initialized session and its manager
//! - **registry**: Typed repositories for registry tables
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper and statement runner
//! │   ├── placeholders# $N -> ?N parameter translation
//! │   └── schema      # Table and index definitions, bootstrap
//! │
//! ├── session/        # SessionManager, Session
//! │
//! └── registry/       # Repositories
//!     └── patients    # Patient rows, search, aggregates
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use patreg::database::{SessionManager, PatientRepository};
//!
//! let manager = SessionManager::in_memory();
//! let session = manager.acquire().await?;
//! let total = PatientRepository::new(&session).count().await?;
//! ```

pub mod core;
pub mod registry;
pub mod session;

pub use core::{
    bind_placeholders, trim_statement, DatabaseConn, QueryResult, Row, SchemaDefinitions,
    SchemaManager, SchemaStatus, StatementInfo,
};

pub use registry::{
    Gender, GenderCount, MonthlyCount, Pagination, PatientDraft, PatientPage, PatientRecord,
    PatientRepository, PatientSummary,
};

pub use session::{
    Opener, Session, SessionError, SessionManager, SessionOptions, SessionState, SqlValue,
};
