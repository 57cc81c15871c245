//! Patient repository
//!
//! All reads and writes against the `patients` table go through this
//! repository, which in turn only talks to the database through
//! [`Session::query`].

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::database::core::QueryResult;
use crate::database::session::{Session, SessionError, SqlValue};

/// Timestamp format produced by the schema defaults and by edits
const NOW_EXPR: &str = "strftime('%Y-%m-%dT%H:%M:%f', 'now')";

// =============================================================================
// Types
// =============================================================================

/// Stored lowercase; read back ignoring case and surrounding whitespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Validated patient fields, ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PatientDraft {
    /// Bound values in column order: names, dob, gender, address, phone, email
    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.first_name.clone()),
            SqlValue::from(self.last_name.clone()),
            SqlValue::from(self.date_of_birth.format("%Y-%m-%d").to_string()),
            SqlValue::from(self.gender.as_str().to_string()),
            SqlValue::from(self.address.clone()),
            SqlValue::from(self.phone.clone()),
            SqlValue::from(self.email.clone()),
        ]
    }
}

/// A stored patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Short form used by search results and the recent list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
}

/// Page position and totals for a paged read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_records: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_records.div_ceil(page_size as u64)
        };
        Self {
            page,
            page_size,
            total_records,
            total_pages,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPage {
    pub patients: Vec<PatientRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderCount {
    pub gender: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for patient rows
pub struct PatientRepository<'a> {
    session: &'a Session,
}

impl<'a> PatientRepository<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Insert a new patient and return its id
    pub async fn insert(&self, draft: &PatientDraft) -> Result<i64, SessionError> {
        let result = self
            .session
            .query(
                "INSERT INTO patients \
                 (first_name, last_name, date_of_birth, gender, address, phone, email) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
                &draft.values(),
            )
            .await?;

        let id = returned_id(&result)?;
        debug!("inserted patient {}", id);
        Ok(id)
    }

    /// Overwrite every editable field of a patient and stamp `updated_at`.
    ///
    /// Returns `false` when no patient has the given id.
    pub async fn update(&self, id: i64, draft: &PatientDraft) -> Result<bool, SessionError> {
        let mut params = draft.values();
        params.push(SqlValue::from(id));

        let sql = format!(
            "UPDATE patients SET \
             first_name = $1, last_name = $2, date_of_birth = $3, gender = $4, \
             address = $5, phone = $6, email = $7, updated_at = {} \
             WHERE id = $8",
            NOW_EXPR
        );
        let result = self.session.query(&sql, &params).await?;
        debug!("updated patient {}: {} row(s)", id, result.rows_affected);
        Ok(result.rows_affected > 0)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<PatientRecord>, SessionError> {
        let result = self
            .session
            .query("SELECT * FROM patients WHERE id = $1", &[SqlValue::from(id)])
            .await?;
        Ok(decode_rows::<PatientRecord>(result)?.into_iter().next())
    }

    pub async fn count(&self) -> Result<u64, SessionError> {
        let result = self
            .session
            .query("SELECT COUNT(*) AS count FROM patients", &[])
            .await?;
        Ok(count_of(&result))
    }

    /// One page of patients, newest id first
    pub async fn list_page(&self, page: u32, page_size: u32) -> Result<PatientPage, SessionError> {
        let pagination = Pagination::new(page.max(1), page_size.max(1), self.count().await?);
        let result = self
            .session
            .query(
                "SELECT * FROM patients ORDER BY id DESC LIMIT $1 OFFSET $2",
                &[
                    SqlValue::from(pagination.page_size as i64),
                    SqlValue::from(pagination.offset() as i64),
                ],
            )
            .await?;

        Ok(PatientPage {
            patients: decode_rows(result)?,
            pagination,
        })
    }

    /// Patients whose first or last name contains `term`, ignoring case
    pub async fn search_by_name(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<PatientSummary>, SessionError> {
        let pattern = format!("%{}%", escape_like(term));
        let result = self
            .session
            .query(
                "SELECT id, first_name, last_name, date_of_birth FROM patients \
                 WHERE first_name LIKE $1 ESCAPE '\\' OR last_name LIKE $1 ESCAPE '\\' \
                 ORDER BY last_name, first_name, id LIMIT $2",
                &[SqlValue::from(pattern), SqlValue::from(limit as i64)],
            )
            .await?;
        decode_rows(result)
    }

    /// Most recently registered patients
    pub async fn recent(&self, limit: u32) -> Result<Vec<PatientSummary>, SessionError> {
        let result = self
            .session
            .query(
                "SELECT id, first_name, last_name, date_of_birth FROM patients \
                 ORDER BY created_at DESC, id DESC LIMIT $1",
                &[SqlValue::from(limit as i64)],
            )
            .await?;
        decode_rows(result)
    }

    pub async fn gender_distribution(&self) -> Result<Vec<GenderCount>, SessionError> {
        let result = self
            .session
            .query(
                "SELECT gender, COUNT(*) AS count FROM patients GROUP BY gender ORDER BY gender",
                &[],
            )
            .await?;
        decode_rows(result)
    }

    pub async fn monthly_registrations(&self) -> Result<Vec<MonthlyCount>, SessionError> {
        let result = self
            .session
            .query(
                "SELECT substr(created_at, 1, 7) AS month, COUNT(*) AS count \
                 FROM patients GROUP BY month ORDER BY month",
                &[],
            )
            .await?;
        decode_rows(result)
    }
}

/// Decode every row of a result into `T`
pub fn decode_rows<T: DeserializeOwned>(result: QueryResult) -> Result<Vec<T>, SessionError> {
    result
        .rows
        .into_iter()
        .map(|row| serde_json::from_value(JsonValue::Object(row)).map_err(SessionError::from))
        .collect()
}

/// The `id` column of an `INSERT ... RETURNING id`
fn returned_id(result: &QueryResult) -> Result<i64, SessionError> {
    result
        .first()
        .and_then(|row| row.get("id"))
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| SessionError::MissingRow("insert returned no id".to_string()))
}

/// Read the `count` column of a single-row aggregate
pub fn count_of(result: &QueryResult) -> u64 {
    result
        .first()
        .and_then(|row| row.get("count"))
        .and_then(JsonValue::as_u64)
        .unwrap_or(0)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::session::SessionManager;
    use std::sync::Arc;

    fn draft(first: &str, last: &str, dob: &str, gender: Gender) -> PatientDraft {
        PatientDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::parse_from_str(dob, "%Y-%m-%d").unwrap(),
            gender,
            address: None,
            phone: None,
            email: None,
        }
    }

    async fn session() -> Arc<Session> {
        SessionManager::in_memory().acquire().await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let session = session().await;
        let repo = PatientRepository::new(&session);

        let ada = draft("Ada", "Lovelace", "1815-12-10", Gender::Female);
        let id = repo.insert(&ada).await.unwrap();

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.first_name, "Ada");
        assert_eq!(found.last_name, "Lovelace");
        assert_eq!(
            found.date_of_birth,
            NaiveDate::from_ymd_opt(1815, 12, 10).unwrap()
        );
        assert_eq!(found.gender, Gender::Female);
        assert_eq!(found.address, None);
        assert_eq!(found.created_at, found.updated_at);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let session = session().await;
        let repo = PatientRepository::new(&session);
        assert!(repo.find_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_preserves_identity() {
        let session = session().await;
        let repo = PatientRepository::new(&session);

        let mut ada = draft("Ada", "Lovelace", "1815-12-10", Gender::Female);
        let id = repo.insert(&ada).await.unwrap();
        let before = repo.find_by_id(id).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ada.address = Some("12 St James's Square, London".to_string());
        ada.phone = Some("2025550143".to_string());
        ada.email = Some("ada@analytical.engine".to_string());
        assert!(repo.update(id, &ada).await.unwrap());

        let after = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.address, ada.address);
        assert_eq!(after.phone, ada.phone);
        assert_eq!(after.email, ada.email);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_returns_false() {
        let session = session().await;
        let repo = PatientRepository::new(&session);
        let ghost = draft("No", "One", "1990-01-01", Gender::Other);
        assert!(!repo.update(99, &ghost).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_page_boundaries() {
        let session = session().await;
        let repo = PatientRepository::new(&session);
        for i in 0..25 {
            repo.insert(&draft(&format!("P{}", i), "Test", "1990-01-01", Gender::Other))
                .await
                .unwrap();
        }

        let sizes: Vec<usize> = {
            let mut sizes = Vec::new();
            for page in 1..=3 {
                let result = repo.list_page(page, 10).await.unwrap();
                assert_eq!(result.pagination.total_records, 25);
                assert_eq!(result.pagination.total_pages, 3);
                sizes.push(result.patients.len());
            }
            sizes
        };
        assert_eq!(sizes, vec![10, 10, 5]);

        let first = repo.list_page(1, 10).await.unwrap();
        assert_eq!(first.patients[0].first_name, "P24");
        assert!(first.pagination.has_next());
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let session = session().await;
        let repo = PatientRepository::new(&session);
        repo.insert(&draft("Ada", "Lovelace", "1815-12-10", Gender::Female))
            .await
            .unwrap();
        repo.insert(&draft("Alan", "Turing", "1912-06-23", Gender::Male))
            .await
            .unwrap();
        repo.insert(&draft("Grace", "Hopper", "1906-12-09", Gender::Female))
            .await
            .unwrap();

        let found = repo.search_by_name("LOVE", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Lovelace");

        let found = repo.search_by_name("a", 10).await.unwrap();
        assert_eq!(found.len(), 3);

        assert!(repo.search_by_name("%", 10).await.unwrap().is_empty());
        assert_eq!(repo.search_by_name("a", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let session = session().await;
        let repo = PatientRepository::new(&session);
        repo.insert(&draft("Ada", "Lovelace", "1815-12-10", Gender::Female))
            .await
            .unwrap();
        repo.insert(&draft("Grace", "Hopper", "1906-12-09", Gender::Female))
            .await
            .unwrap();
        repo.insert(&draft("Alan", "Turing", "1912-06-23", Gender::Male))
            .await
            .unwrap();

        let genders = repo.gender_distribution().await.unwrap();
        assert_eq!(
            genders,
            vec![
                GenderCount {
                    gender: "female".to_string(),
                    count: 2
                },
                GenderCount {
                    gender: "male".to_string(),
                    count: 1
                },
            ]
        );

        let months = repo.monthly_registrations().await.unwrap();
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].count, 3);
        assert_eq!(months[0].month.len(), 7);

        let recent = repo.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].first_name, "Alan");
    }

    #[test]
    fn test_returned_id() {
        let err = returned_id(&QueryResult::default()).unwrap_err();
        assert!(matches!(err, SessionError::MissingRow(_)));
        assert_eq!(err.to_string(), "expected row missing: insert returned no id");

        let mut row = crate::database::Row::new();
        row.insert("id".to_string(), serde_json::json!(7));
        let result = QueryResult {
            columns: vec!["id".to_string()],
            rows: vec![row],
            rows_affected: 0,
        };
        assert_eq!(returned_id(&result).unwrap(), 7);
    }

    #[test]
    fn test_gender_decodes_ignoring_case() {
        let gender: Gender = serde_json::from_value(serde_json::json!("Female")).unwrap();
        assert_eq!(gender, Gender::Female);
        let gender: Gender = serde_json::from_value(serde_json::json!(" OTHER ")).unwrap();
        assert_eq!(gender, Gender::Other);
        assert!(serde_json::from_value::<Gender>(serde_json::json!("f")).is_err());
        assert_eq!(serde_json::to_value(Gender::Male).unwrap(), serde_json::json!("male"));
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" other ".parse::<Gender>().unwrap(), Gender::Other);
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(3, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset(), 20);
        assert!(!p.has_next());
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }
}
