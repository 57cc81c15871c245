//! Registry data access
//!
//! Typed repositories over a [`Session`](crate::database::Session).

mod patients;

pub use patients::{
    count_of, decode_rows, Gender, GenderCount, MonthlyCount, Pagination, PatientDraft,
    PatientPage, PatientRecord, PatientRepository, PatientSummary,
};
