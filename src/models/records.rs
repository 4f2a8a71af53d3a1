//! Medical record rows returned by the record query tools.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use super::patient::Patient;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VitalRecord {
    pub vital_id: String,
    pub patient_id: String,
    pub vital_type: String,
    pub value: String,
    pub unit: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Option<String>,
    pub notes: Option<String>,
}

/// One medication line inside a prescription's JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Medication {
    #[serde(alias = "name")]
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrescriptionRecord {
    pub prescription_id: String,
    pub medications: Json<Vec<Medication>>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub prescribed_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub is_active: bool,
    pub doctor_first_name: Option<String>,
    pub doctor_last_name: Option<String>,
    pub specialization: Option<String>,
}

impl PrescriptionRecord {
    pub fn doctor_name(&self) -> Option<String> {
        doctor_name(&self.doctor_first_name, &self.doctor_last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReportRecord {
    pub report_id: String,
    pub report_type: String,
    pub title: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub report_date: NaiveDate,
    pub doctor_first_name: Option<String>,
    pub doctor_last_name: Option<String>,
    pub specialization: Option<String>,
}

impl ReportRecord {
    pub fn doctor_name(&self) -> Option<String> {
        doctor_name(&self.doctor_first_name, &self.doctor_last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub history_id: String,
    pub doctor_name: String,
    pub visit_date: NaiveDate,
    pub diagnosis: Option<String>,
    pub health_status: Option<String>,
    pub blood_pressure: Option<String>,
    pub symptoms: Json<Vec<String>>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

/// Everything the record tools know about one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecords {
    pub patient: Patient,
    pub vitals: Vec<VitalRecord>,
    pub prescriptions: Vec<PrescriptionRecord>,
    pub reports: Vec<ReportRecord>,
    pub history: Vec<HistoryEntry>,
}

/// Filter for vitals lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsQuery {
    pub patient_id: String,
    pub vital_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl VitalsQuery {
    pub fn for_patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            vital_type: None,
            since: None,
            until: None,
            limit: 100,
        }
    }
}

/// Payload for recording a vital sign.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewVital {
    #[validate(length(min = 1, max = 50))]
    pub vital_type: String,
    #[validate(length(min = 1, max = 50))]
    pub value: String,
    #[validate(length(max = 20))]
    pub unit: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    #[validate(length(max = 100))]
    pub recorded_by: Option<String>,
    pub notes: Option<String>,
}

fn doctor_name(first: &Option<String>, last: &Option<String>) -> Option<String> {
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("Dr. {} {}", first, last)),
        (Some(name), None) | (None, Some(name)) => Some(format!("Dr. {}", name)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_accepts_short_name_alias() {
        let meds: Vec<Medication> = serde_json::from_str(
            r#"[{"name": "Metformin", "dosage": "500mg"}, {"medication_name": "Lisinopril"}]"#,
        )
        .unwrap();
        assert_eq!(meds[0].medication_name.as_deref(), Some("Metformin"));
        assert_eq!(meds[1].medication_name.as_deref(), Some("Lisinopril"));
        assert!(meds[1].dosage.is_none());
    }

    #[test]
    fn doctor_name_handles_partial_names() {
        assert_eq!(
            doctor_name(&Some("Sarah".into()), &Some("Johnson".into())).as_deref(),
            Some("Dr. Sarah Johnson")
        );
        assert_eq!(doctor_name(&None, &Some("House".into())).as_deref(), Some("Dr. House"));
        assert_eq!(doctor_name(&None, &None), None);
    }
}
