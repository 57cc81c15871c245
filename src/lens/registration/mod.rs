//! Registration lens
//!
//! Validates patient input and writes it through the session. A successful
//! write announces the change to other contexts; a rejected form never
//! reaches the database.

pub mod args;

pub use args::{PatientEditArgs, PatientForm};

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::database::{
    Gender, PatientDraft, PatientRecord, PatientRepository, SessionError, SessionManager,
};
use crate::lens::error::RegistryResult;
use crate::notify::ChangeNotifier;

/// Longest accepted first or last name, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted email address, in characters
pub const MAX_EMAIL_LEN: usize = 100;

#[allow(clippy::expect_used)]
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern to compile")
});

/// A rule the patient form broke
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("First and last name are required")]
    NameRequired,

    #[error("{field} must be at most 100 characters")]
    NameTooLong { field: &'static str },

    #[error("Date of birth is required")]
    DateOfBirthRequired,

    #[error("Invalid date of birth '{0}', expected YYYY-MM-DD")]
    InvalidDateOfBirth(String),

    #[error("Date of birth cannot be in the future")]
    DateOfBirthInFuture,

    #[error("Gender is required")]
    GenderRequired,

    #[error("Invalid gender '{0}', expected one of male, female, other")]
    InvalidGender(String),

    #[error("Phone number must be exactly 10 digits")]
    InvalidPhone,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Email must be at most 100 characters")]
    EmailTooLong,
}

impl PatientForm {
    /// Check the form against today's local date
    pub fn validate(&self) -> Result<PatientDraft, ValidationError> {
        self.validate_at(Local::now().date_naive())
    }

    /// Check the form, treating `today` as the latest allowed birth date
    pub fn validate_at(&self, today: NaiveDate) -> Result<PatientDraft, ValidationError> {
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ValidationError::NameRequired);
        }
        if first_name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong {
                field: "First name",
            });
        }
        if last_name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong { field: "Last name" });
        }

        let dob = self.date_of_birth.trim();
        if dob.is_empty() {
            return Err(ValidationError::DateOfBirthRequired);
        }
        let date_of_birth = NaiveDate::parse_from_str(dob, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDateOfBirth(dob.to_string()))?;
        if date_of_birth > today {
            return Err(ValidationError::DateOfBirthInFuture);
        }

        let gender = self.gender.trim();
        if gender.is_empty() {
            return Err(ValidationError::GenderRequired);
        }
        let gender: Gender = gender
            .parse()
            .map_err(|_| ValidationError::InvalidGender(gender.to_string()))?;

        let phone = non_blank(&self.phone);
        if let Some(phone) = &phone {
            if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidPhone);
            }
        }

        let email = non_blank(&self.email);
        if let Some(email) = &email {
            if !EMAIL_PATTERN.is_match(email) {
                return Err(ValidationError::InvalidEmail);
            }
            if email.chars().count() > MAX_EMAIL_LEN {
                return Err(ValidationError::EmailTooLong);
            }
        }

        Ok(PatientDraft {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth,
            gender,
            address: non_blank(&self.address),
            phone,
            email,
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Registration lens: register and edit patients
pub struct RegistrationLens<'a> {
    sessions: &'a SessionManager,
    notifier: &'a ChangeNotifier,
}

impl<'a> RegistrationLens<'a> {
    pub fn new(sessions: &'a SessionManager, notifier: &'a ChangeNotifier) -> Self {
        Self { sessions, notifier }
    }

    /// Validate and insert a new patient, then tell other contexts
    pub async fn register(&self, form: &PatientForm) -> RegistryResult<PatientRecord> {
        let draft = form.validate()?;

        let session = self.sessions.acquire().await?;
        let repo = PatientRepository::new(&session);
        let id = repo.insert(&draft).await?;
        let record = repo.find_by_id(id).await?.ok_or_else(|| {
            SessionError::MissingRow(format!("patient {} missing after insert", id))
        })?;

        info!("registered patient {} ({})", id, record.full_name());
        self.notifier.notify_data_changed();
        Ok(record)
    }

    /// Validate and overwrite an existing patient, then tell other contexts
    ///
    /// Returns `Ok(None)` when no patient has the given id.
    pub async fn edit(&self, id: i64, form: &PatientForm) -> RegistryResult<Option<PatientRecord>> {
        let draft = form.validate()?;

        let session = self.sessions.acquire().await?;
        let repo = PatientRepository::new(&session);
        if !repo.update(id, &draft).await? {
            return Ok(None);
        }

        info!("updated patient {}", id);
        self.notifier.notify_data_changed();
        Ok(repo.find_by_id(id).await?)
    }

    /// Pre-fill a form from a stored patient
    pub async fn load_form(&self, id: i64) -> RegistryResult<Option<PatientForm>> {
        let session = self.sessions.acquire().await?;
        let record = PatientRepository::new(&session).find_by_id(id).await?;
        Ok(record.as_ref().map(PatientForm::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::error::RegistryError;
    use crate::notify::{BroadcastChannel, InProcessBus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ada() -> PatientForm {
        PatientForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: "1815-12-10".to_string(),
            gender: "female".to_string(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_valid_form() {
        let mut form = ada();
        form.first_name = "  Ada ".to_string();
        form.address = "   ".to_string();
        form.phone = "2025550143".to_string();
        form.email = "ada@analytical.engine".to_string();

        let draft = form.validate_at(today()).unwrap();
        assert_eq!(draft.first_name, "Ada");
        assert_eq!(draft.gender, Gender::Female);
        assert_eq!(draft.address, None);
        assert_eq!(draft.phone.as_deref(), Some("2025550143"));
    }

    #[test]
    fn test_names_required() {
        let mut form = ada();
        form.last_name = "  ".to_string();
        assert_eq!(form.validate_at(today()), Err(ValidationError::NameRequired));
        assert_eq!(
            ValidationError::NameRequired.to_string(),
            "First and last name are required"
        );

        let mut form = ada();
        form.first_name = "x".repeat(101);
        assert_eq!(
            form.validate_at(today()),
            Err(ValidationError::NameTooLong {
                field: "First name"
            })
        );
    }

    #[test]
    fn test_date_of_birth_rules() {
        let mut form = ada();
        form.date_of_birth = String::new();
        assert_eq!(
            form.validate_at(today()),
            Err(ValidationError::DateOfBirthRequired)
        );

        form.date_of_birth = "10/12/1815".to_string();
        assert!(matches!(
            form.validate_at(today()),
            Err(ValidationError::InvalidDateOfBirth(_))
        ));

        form.date_of_birth = "2024-06-02".to_string();
        assert_eq!(
            form.validate_at(today()),
            Err(ValidationError::DateOfBirthInFuture)
        );

        form.date_of_birth = "2024-06-01".to_string();
        assert!(form.validate_at(today()).is_ok());
    }

    #[test]
    fn test_gender_phone_email_rules() {
        let form = PatientForm {
            gender: String::new(),
            ..ada()
        };
        assert_eq!(form.validate_at(today()), Err(ValidationError::GenderRequired));
        let omitted: PatientForm = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1815-12-10"
        }))
        .unwrap();
        assert_eq!(omitted.validate_at(today()), Err(ValidationError::GenderRequired));

        let mut form = ada();
        form.gender = "unknown".to_string();
        assert_eq!(
            form.validate_at(today()),
            Err(ValidationError::InvalidGender("unknown".to_string()))
        );

        let mut form = ada();
        form.phone = "555-0143".to_string();
        assert_eq!(form.validate_at(today()), Err(ValidationError::InvalidPhone));

        let mut form = ada();
        form.email = "not-an-email".to_string();
        assert_eq!(form.validate_at(today()), Err(ValidationError::InvalidEmail));
        assert_eq!(
            ValidationError::InvalidEmail.to_string(),
            "Please enter a valid email address"
        );

        let mut form = ada();
        form.email = format!("{}@example.com", "a".repeat(100));
        assert_eq!(form.validate_at(today()), Err(ValidationError::EmailTooLong));
    }

    #[test]
    fn test_edit_args_overlay() {
        let args = PatientEditArgs {
            phone: Some("2025550143".to_string()),
            address: Some(String::new()),
            ..Default::default()
        };
        let mut base = ada();
        base.address = "Old address".to_string();

        let form = args.apply_to(base);
        assert_eq!(form.first_name, "Ada");
        assert_eq!(form.phone, "2025550143");
        assert_eq!(form.address, "");
        assert!(PatientEditArgs::default().is_empty());
    }

    struct Harness {
        sessions: SessionManager,
        writer: ChangeNotifier,
        peer: ChangeNotifier,
    }

    fn harness() -> Harness {
        let bus: Arc<dyn BroadcastChannel> = Arc::new(InProcessBus::default());
        Harness {
            sessions: SessionManager::in_memory(),
            writer: ChangeNotifier::new(bus.clone()),
            peer: ChangeNotifier::new(bus),
        }
    }

    async fn patient_count(sessions: &SessionManager) -> u64 {
        let session = sessions.acquire().await.unwrap();
        PatientRepository::new(&session).count().await.unwrap()
    }

    #[tokio::test]
    async fn test_register_round_trip_and_notifies() {
        let h = harness();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _sub = h.peer.on_data_changed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let lens = RegistrationLens::new(&h.sessions, &h.writer);
        let record = lens.register(&ada()).await.unwrap();
        assert_eq!(record.first_name, "Ada");
        assert_eq!(record.last_name, "Lovelace");
        assert_eq!(
            record.date_of_birth,
            NaiveDate::from_ymd_opt(1815, 12, 10).unwrap()
        );
        assert_eq!(record.gender, Gender::Female);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_gate_blocks_insert() {
        let h = harness();
        let lens = RegistrationLens::new(&h.sessions, &h.writer);
        lens.register(&ada()).await.unwrap();

        let tomorrow = (Local::now().date_naive() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let mut bad_forms = Vec::new();

        let mut form = ada();
        form.last_name = String::new();
        bad_forms.push(form);

        let mut form = ada();
        form.date_of_birth = tomorrow;
        bad_forms.push(form);

        let mut form = ada();
        form.email = "not-an-email".to_string();
        bad_forms.push(form);

        for form in bad_forms {
            let err = lens.register(&form).await.unwrap_err();
            assert!(matches!(err, RegistryError::Validation(_)));
            assert!(err.is_user_error());
        }
        assert_eq!(patient_count(&h.sessions).await, 1);
    }

    #[tokio::test]
    async fn test_edit_and_load_form() {
        let h = harness();
        let lens = RegistrationLens::new(&h.sessions, &h.writer);
        let created = lens.register(&ada()).await.unwrap();

        let mut form = lens.load_form(created.id).await.unwrap().unwrap();
        assert_eq!(form, ada());

        form.address = "12 St James's Square".to_string();
        form.phone = "2025550143".to_string();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = lens.edit(created.id, &form).await.unwrap().unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.address.as_deref(), Some("12 St James's Square"));
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_edit_missing_patient() {
        let h = harness();
        let lens = RegistrationLens::new(&h.sessions, &h.writer);
        assert!(lens.edit(404, &ada()).await.unwrap().is_none());
        assert!(lens.load_form(404).await.unwrap().is_none());
    }
}
