//! Visit history kept by clinicians, and the paging shared by list endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::{Validate, ValidationError};

use super::records::Medication;

/// A row of the `medical_history` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MedicalHistory {
    pub history_id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub doctor_name: String,
    pub visit_date: NaiveDate,
    pub diagnosis: Option<String>,
    pub prescriptions: Json<Vec<Medication>>,
    pub health_status: Option<String>,
    pub blood_pressure: Option<String>,
    pub symptoms: Json<Vec<String>>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_follow_up", skip_on_field_errors = false))]
pub struct NewHistoryEntry {
    #[validate(length(min = 1, max = 64))]
    pub patient_id: String,
    pub doctor_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub doctor_name: String,
    pub visit_date: NaiveDate,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Medication>,
    #[validate(length(max = 50))]
    pub health_status: Option<String>,
    #[validate(length(max = 20))]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

fn validate_follow_up(entry: &NewHistoryEntry) -> Result<(), ValidationError> {
    match entry.follow_up_date {
        Some(follow_up) if follow_up < entry.visit_date => {
            Err(ValidationError::new("follow_up_before_visit"))
        }
        _ => Ok(()),
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HistoryUpdate {
    pub doctor_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub doctor_name: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub diagnosis: Option<String>,
    pub prescriptions: Option<Vec<Medication>>,
    #[validate(length(max = 50))]
    pub health_status: Option<String>,
    #[validate(length(max = 20))]
    pub blood_pressure: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

pub const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&page_size=` on list endpoints. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PageParams {
    #[serde(default = "first_page")]
    #[validate(range(min = 1))]
    pub page: i64,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: i64,
}

fn first_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.page_size - 1) / self.page_size
    }
}
