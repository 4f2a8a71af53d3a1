use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::{Validate, ValidationError};

use super::history::PageParams;

pub const GENDERS: &[&str] = &["Male", "Female", "Other", "Prefer not to say"];
pub const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceInfo {
    pub provider: Option<String>,
    pub policy_number: Option<String>,
    pub group_number: Option<String>,
}

/// A row of the `patients` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub patient_id: String,
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub age: Option<i32>,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Json<Address>>,
    pub emergency_contact: Option<Json<EmergencyContact>>,
    pub blood_type: Option<String>,
    pub allergies: Json<Vec<String>>,
    pub chronic_conditions: Json<Vec<String>>,
    pub insurance_info: Option<Json<InsuranceInfo>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Payload for registering a patient.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPatient {
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[validate(custom = "validate_gender")]
    pub gender: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    #[validate(custom = "validate_blood_type")]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    pub insurance_info: Option<InsuranceInfo>,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PatientUpdate {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(custom = "validate_gender")]
    pub gender: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    #[validate(custom = "validate_blood_type")]
    pub blood_type: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub chronic_conditions: Option<Vec<String>>,
    pub insurance_info: Option<InsuranceInfo>,
}

/// `GET /api/patients` query. Query strings cannot go through
/// `serde(flatten)` with numbers, so the paging fields are repeated here.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PatientListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default = "active_only")]
    pub active_only: bool,
}

fn active_only() -> bool {
    true
}

impl PatientListParams {
    pub fn paging(&self) -> PageParams {
        let defaults = PageParams::default();
        PageParams {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    if GENDERS.contains(&gender) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_gender"))
    }
}

fn validate_blood_type(blood_type: &str) -> Result<(), ValidationError> {
    if BLOOD_TYPES.contains(&blood_type) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_blood_type"))
    }
}

/// Age in whole years on `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test_case(date(1990, 1, 15), date(2024, 1, 14), 33 ; "day before birthday")]
    #[test_case(date(1990, 1, 15), date(2024, 1, 15), 34 ; "on birthday")]
    #[test_case(date(2000, 12, 31), date(2001, 1, 1), 0 ; "infant")]
    fn computes_age(dob: NaiveDate, today: NaiveDate, expected: i32) {
        assert_eq!(age_on(dob, today), expected);
    }

    fn new_patient() -> NewPatient {
        serde_json::from_value(serde_json::json!({
            "first_name": "John",
            "last_name": "Doe",
            "date_of_birth": "1990-01-15",
            "gender": "Male",
            "email": "john.doe@example.com",
            "blood_type": "A+"
        }))
        .unwrap()
    }

    #[test]
    fn accepts_well_formed_patient() {
        let patient = new_patient();
        assert!(patient.validate().is_ok());
        assert!(patient.allergies.is_empty());
    }

    #[test]
    fn rejects_unknown_blood_type_and_bad_email() {
        let mut patient = new_patient();
        patient.blood_type = Some("C+".into());
        patient.email = Some("not-an-email".into());

        let errors = patient.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("blood_type"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn update_checks_only_present_fields() {
        let update: PatientUpdate =
            serde_json::from_value(serde_json::json!({"phone": "555-0101"})).unwrap();
        assert!(update.validate().is_ok());

        let update = PatientUpdate {
            gender: Some("Unknown".into()),
            ..Default::default()
        };
        assert!(update.validate().unwrap_err().field_errors().contains_key("gender"));
    }

    #[test]
    fn rejects_empty_names() {
        let mut patient = new_patient();
        patient.first_name.clear();
        assert!(patient.validate().is_err());
    }
}
