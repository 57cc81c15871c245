//! Lens module
//!
//! Lenses combine registry logic with the shapes the interfaces need. The CLI
//! and the WebSocket server both go through them, so validation, paging and
//! change notification behave the same everywhere.
//!
//! | Lens | Operations |
//! |------|------------|
//! | `RegistrationLens` | register, edit, load_form |
//! | `PatientLens` | get, list |
//! | `DashboardLens` | stats, search |
//! | `QueryLens` / `QueryWatch` | execute, live refresh |
//! | `ExportLens` | export as CSV or JSON |
//!
//! Lenses that change data take a [`ChangeNotifier`](crate::notify::ChangeNotifier)
//! and announce the change once it is committed.
//!
//! ```rust,ignore
//! use patreg::lens::registration::{PatientForm, RegistrationLens};
//!
//! let lens = RegistrationLens::new(&sessions, &notifier);
//! let record = lens.register(&form).await?;
//! println!("registered #{}", record.id);
//! ```

// =============================================================================
// Shared
// =============================================================================
pub mod error;
pub mod utils;

// =============================================================================
// Patient lenses
// =============================================================================

// RegistrationLens - validated create and edit
pub mod registration;

// PatientLens - single record and paged list
pub mod patient;

// DashboardLens - totals, distributions and name search
pub mod dashboard;

// =============================================================================
// Console lenses
// =============================================================================

// QueryLens - ad-hoc statements with paging
pub mod query;

// ExportLens - CSV / JSON downloads
pub mod export;

pub use error::{RegistryError, RegistryResult};
