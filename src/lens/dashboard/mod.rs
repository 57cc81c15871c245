//! Dashboard lens
//!
//! Registry-wide statistics and the quick name search.

use serde::{Deserialize, Serialize};

use crate::database::{MonthlyCount, PatientRepository, PatientSummary, SessionManager};
use crate::lens::error::RegistryResult;

/// Number of patients shown as recent registrations
pub const RECENT_LIMIT: u32 = 5;

/// Maximum number of name search results
pub const SEARCH_LIMIT: u32 = 10;

/// Arguments for the name search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PatientSearchArgs {
    /// Text to look for in first or last names (case-insensitive)
    pub term: String,
}

/// Share of patients with one gender value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderShare {
    pub gender: String,
    pub count: u64,
    /// Percentage of all patients, rounded to one decimal
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_patients: u64,
    pub recent_patients: Vec<PatientSummary>,
    pub gender_distribution: Vec<GenderShare>,
    pub monthly_registrations: Vec<MonthlyCount>,
}

pub struct DashboardLens<'a> {
    sessions: &'a SessionManager,
}

impl<'a> DashboardLens<'a> {
    pub fn new(sessions: &'a SessionManager) -> Self {
        Self { sessions }
    }

    pub async fn stats(&self) -> RegistryResult<DashboardStats> {
        let session = self.sessions.acquire().await?;
        let repo = PatientRepository::new(&session);

        let total_patients = repo.count().await?;
        let recent_patients = repo.recent(RECENT_LIMIT).await?;
        let gender_distribution = repo
            .gender_distribution()
            .await?
            .into_iter()
            .map(|g| GenderShare {
                percentage: percentage(g.count, total_patients),
                gender: g.gender,
                count: g.count,
            })
            .collect();
        let monthly_registrations = repo.monthly_registrations().await?;

        Ok(DashboardStats {
            total_patients,
            recent_patients,
            gender_distribution,
            monthly_registrations,
        })
    }

    /// Patients whose first or last name contains the term
    ///
    /// A blank term returns nothing without touching the database.
    pub async fn search(&self, args: &PatientSearchArgs) -> RegistryResult<Vec<PatientSummary>> {
        let term = args.term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.sessions.acquire().await?;
        Ok(PatientRepository::new(&session)
            .search_by_name(term, SEARCH_LIMIT)
            .await?)
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}
