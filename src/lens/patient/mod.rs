//! Patient lens
//!
//! Detail lookup and the paged patient list.

use serde::{Deserialize, Serialize};

use crate::database::{PatientPage, PatientRecord, PatientRepository, SessionManager};
use crate::lens::error::RegistryResult;

/// Largest page the list accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Arguments for listing patients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct PatientListArgs {
    /// Page number, starting at 1
    #[cfg_attr(feature = "cli", clap(long, default_value_t = 1))]
    pub page: u32,

    /// Rows per page (defaults to the configured page size)
    #[cfg_attr(feature = "cli", clap(long))]
    pub page_size: Option<u32>,
}

impl Default for PatientListArgs {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
        }
    }
}

impl PatientListArgs {
    /// Page and page size after clamping, falling back to `default_size`
    pub fn normalized(&self, default_size: u32) -> (u32, u32) {
        let size = self.page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
        (self.page.max(1), size)
    }
}

pub struct PatientLens<'a> {
    sessions: &'a SessionManager,
}

impl<'a> PatientLens<'a> {
    pub fn new(sessions: &'a SessionManager) -> Self {
        Self { sessions }
    }

    /// Look up one patient; `Ok(None)` if the id is unknown
    pub async fn get(&self, id: i64) -> RegistryResult<Option<PatientRecord>> {
        let session = self.sessions.acquire().await?;
        Ok(PatientRepository::new(&session).find_by_id(id).await?)
    }

    /// One page of patients, newest first
    pub async fn list(&self, args: &PatientListArgs, default_size: u32) -> RegistryResult<PatientPage> {
        let (page, page_size) = args.normalized(default_size);
        let session = self.sessions.acquire().await?;
        Ok(PatientRepository::new(&session)
            .list_page(page, page_size)
            .await?)
    }
}
