#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! patreg - a local patient registry
//!
//! patreg keeps patient records in an embedded SQLite database. Every consumer
//! of the registry (a CLI process, a WebSocket client, a test task) is a
//! *context*: contexts share one lazily opened session and tell each other
//! when stored data changes.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `database` | Session manager, schema bootstrap, patient repository | `rusqlite`, `tokio` |
//! | `lens` | Validation, dashboard, query console, export | `regex`, `csv` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary with the WebSocket server | All above + `clap`, `axum` |
//!
//! ```toml
//! # Library use without the CLI
//! patreg = { version = "0.3", default-features = false, features = ["lens"] }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection, schema, the [`SessionManager`] and typed
//!   repositories
//! - **[`notify`]**: the change channel between contexts
//! - **[`lens`]**: registry operations shared by the CLI and the server
//!   (feature `lens`)
//! - **[`config`]**: configuration file and environment
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use patreg::database::SessionManager;
//! use patreg::lens::registration::{PatientForm, RegistrationLens};
//! use patreg::notify::{ChangeNotifier, InProcessBus};
//!
//! let sessions = SessionManager::in_memory();
//! let notifier = ChangeNotifier::new(Arc::new(InProcessBus::default()));
//!
//! let form = PatientForm {
//!     first_name: "Ada".into(),
//!     last_name: "Lovelace".into(),
//!     date_of_birth: "1815-12-10".into(),
//!     gender: "female".into(),
//!     ..Default::default()
//! };
//! let record = RegistrationLens::new(&sessions, &notifier).register(&form).await?;
//! ```

pub mod config;
pub mod database;
pub mod notify;

#[cfg(feature = "lens")]
pub mod lens;

// Server module - requires CLI feature
#[cfg(feature = "cli")]
pub mod server;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, get_database_info, DatabaseInfo, PatregConfig};

// =============================================================================
// Database
// =============================================================================

pub use database::{
    DatabaseConn, Gender, Pagination, PatientDraft, PatientPage, PatientRecord,
    PatientRepository, PatientSummary, QueryResult, Row, SchemaDefinitions, SchemaManager,
    SchemaStatus, Session, SessionError, SessionManager, SessionOptions, SessionState, SqlValue,
};

// =============================================================================
// Notifications
// =============================================================================

pub use notify::{
    BroadcastChannel, ChangeMessage, ChangeNotifier, ContextId, InProcessBus, Subscription,
};

// =============================================================================
// Lens
// =============================================================================

#[cfg(feature = "lens")]
pub use lens::utils::OutputFormat;
#[cfg(feature = "lens")]
pub use lens::{RegistryError, RegistryResult};

// =============================================================================
// Server (WebSocket API)
// =============================================================================

#[cfg(feature = "cli")]
pub use server::{
    create_router, start_server, Dispatcher, Router, ServerConfig, ServerState, WsContext,
    WsError, WsMethod, WsRequest, WsResult, WsSink,
};
