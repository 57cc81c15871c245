//! Registration lens arguments
//!
//! Raw, unvalidated patient input as it arrives from the CLI, the WebSocket
//! API or a test. Nothing here has been checked yet; see
//! [`PatientForm::validate`](super::PatientForm::validate).

use serde::{Deserialize, Serialize};

use crate::database::PatientRecord;

/// Patient input as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct PatientForm {
    /// First name
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub first_name: String,

    /// Last name
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub last_name: String,

    /// Date of birth, YYYY-MM-DD
    #[cfg_attr(feature = "cli", clap(long = "dob", default_value = ""))]
    pub date_of_birth: String,

    /// One of male, female, other
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub gender: String,

    /// Postal address
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub address: String,

    /// 10-digit phone number
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub phone: String,

    /// Email address
    #[cfg_attr(feature = "cli", clap(long, default_value = ""))]
    pub email: String,
}

impl From<&PatientRecord> for PatientForm {
    fn from(record: &PatientRecord) -> Self {
        Self {
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            date_of_birth: record.date_of_birth.format("%Y-%m-%d").to_string(),
            gender: record.gender.to_string(),
            address: record.address.clone().unwrap_or_default(),
            phone: record.phone.clone().unwrap_or_default(),
            email: record.email.clone().unwrap_or_default(),
        }
    }
}

/// Changes to apply on top of a stored patient
///
/// Fields left as `None` keep their stored value; an empty string clears an
/// optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct PatientEditArgs {
    #[cfg_attr(feature = "cli", clap(long))]
    pub first_name: Option<String>,

    #[cfg_attr(feature = "cli", clap(long))]
    pub last_name: Option<String>,

    #[cfg_attr(feature = "cli", clap(long = "dob"))]
    pub date_of_birth: Option<String>,

    #[cfg_attr(feature = "cli", clap(long))]
    pub gender: Option<String>,

    #[cfg_attr(feature = "cli", clap(long))]
    pub address: Option<String>,

    #[cfg_attr(feature = "cli", clap(long))]
    pub phone: Option<String>,

    #[cfg_attr(feature = "cli", clap(long))]
    pub email: Option<String>,
}

impl PatientEditArgs {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overlay the given changes onto a pre-filled form
    pub fn apply_to(&self, mut form: PatientForm) -> PatientForm {
        let fields = [
            (&self.first_name, &mut form.first_name),
            (&self.last_name, &mut form.last_name),
            (&self.date_of_birth, &mut form.date_of_birth),
            (&self.gender, &mut form.gender),
            (&self.address, &mut form.address),
            (&self.phone, &mut form.phone),
            (&self.email, &mut form.email),
        ];
        for (change, field) in fields {
            if let Some(value) = change {
                *field = value.clone();
            }
        }
        form
    }
}
