//! WebSocket method handlers
//!
//! Handlers are organized by namespace:
//!
//! - `system` - introspection (system.info)
//! - `patient` - registration, edits, detail, list and name search
//! - `query` - the query console (query.execute, query.export)
//! - `dashboard` - registry statistics (dashboard.stats)
//!
//! Handlers that write go through a lens built with the calling connection's
//! notifier, so every other connection hears about the change.

pub mod dashboard;
pub mod patient;
pub mod query;
pub mod system;

pub use dashboard::DashboardStatsHandler;
pub use patient::{
    PatientGetHandler, PatientListHandler, PatientRegisterHandler, PatientSearchHandler,
    PatientUpdateHandler,
};
pub use query::{QueryExecuteHandler, QueryExportHandler};
pub use system::SystemInfoHandler;
