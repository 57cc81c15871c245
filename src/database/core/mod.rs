//! Core database infrastructure
//!
//! This module provides the foundational database components used by the registry:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema bootstrap and status checks
//! - `QueryResult`: Ordered rows returned by the query interface

mod connection;
mod placeholders;
mod schema;

pub use connection::{DatabaseConn, QueryResult, Row, StatementInfo};
pub use placeholders::{bind_placeholders, trim_statement};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus};
