//! Patient repository: writes, listings and soft deletes issued by the REST layer.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tracing::{info, instrument};

use super::queries::{PATIENT_COLUMNS, VITAL_COLUMNS};
use super::{Database, PatientStore, RecordSource};
use crate::models::history::PageParams;
use crate::models::patient::{age_on, NewPatient, Patient, PatientUpdate};
use crate::models::records::{NewVital, VitalRecord};

#[async_trait]
impl PatientStore for Database {
    #[instrument(skip(self, patient), fields(last_name = %patient.last_name))]
    async fn create_patient(&self, patient: &NewPatient) -> Result<Patient, sqlx::Error> {
        let age = age_on(patient.date_of_birth, Utc::now().date_naive());
        let sql = format!(
            "INSERT INTO patients (
                user_id, first_name, last_name, date_of_birth, age, gender,
                email, phone, address, emergency_contact, blood_type,
                allergies, chronic_conditions, insurance_info
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}",
            PATIENT_COLUMNS
        );

        let created = sqlx::query_as::<_, Patient>(&sql)
            .bind(&patient.user_id)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(patient.date_of_birth)
            .bind(age)
            .bind(&patient.gender)
            .bind(&patient.email)
            .bind(&patient.phone)
            .bind(patient.address.clone().map(Json))
            .bind(patient.emergency_contact.clone().map(Json))
            .bind(&patient.blood_type)
            .bind(Json(patient.allergies.clone()))
            .bind(Json(patient.chronic_conditions.clone()))
            .bind(patient.insurance_info.clone().map(Json))
            .fetch_one(self.pool.as_ref())
            .await?;

        info!(patient_id = %created.patient_id, "patient created");
        Ok(created)
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error> {
        self.patient_by_id(patient_id).await
    }

    #[instrument(skip(self))]
    async fn list_patients(
        &self,
        active_only: bool,
        page: PageParams,
    ) -> Result<(Vec<Patient>, i64), sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM patients
             WHERE ($1 = FALSE OR is_active = TRUE)
             ORDER BY last_name, first_name, patient_id
             LIMIT $2 OFFSET $3",
            PATIENT_COLUMNS
        );
        let patients = sqlx::query_as::<_, Patient>(&sql)
            .bind(active_only)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(self.pool.as_ref())
            .await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM patients WHERE ($1 = FALSE OR is_active = TRUE)",
        )
        .bind(active_only)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok((patients, total))
    }

    #[instrument(skip(self))]
    async fn search_patients(&self, term: &str, limit: i64) -> Result<Vec<Patient>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM patients
             WHERE is_active = TRUE
               AND (first_name ILIKE $1 OR last_name ILIKE $1
                    OR (first_name || ' ' || last_name) ILIKE $1
                    OR email ILIKE $1 OR phone ILIKE $1)
             ORDER BY last_name, first_name
             LIMIT $2",
            PATIENT_COLUMNS
        );
        sqlx::query_as::<_, Patient>(&sql)
            .bind(contains_pattern(term))
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self, update))]
    async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
    ) -> Result<Option<Patient>, sqlx::Error> {
        let age = update
            .date_of_birth
            .map(|dob| age_on(dob, Utc::now().date_naive()));
        let sql = format!(
            "UPDATE patients SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                date_of_birth = COALESCE($4, date_of_birth),
                age = COALESCE($5, age),
                gender = COALESCE($6, gender),
                email = COALESCE($7, email),
                phone = COALESCE($8, phone),
                address = COALESCE($9, address),
                emergency_contact = COALESCE($10, emergency_contact),
                blood_type = COALESCE($11, blood_type),
                allergies = COALESCE($12, allergies),
                chronic_conditions = COALESCE($13, chronic_conditions),
                insurance_info = COALESCE($14, insurance_info)
             WHERE patient_id = $1 AND is_active = TRUE
             RETURNING {}",
            PATIENT_COLUMNS
        );

        let updated = sqlx::query_as::<_, Patient>(&sql)
            .bind(patient_id)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(update.date_of_birth)
            .bind(age)
            .bind(&update.gender)
            .bind(&update.email)
            .bind(&update.phone)
            .bind(update.address.clone().map(Json))
            .bind(update.emergency_contact.clone().map(Json))
            .bind(&update.blood_type)
            .bind(update.allergies.clone().map(Json))
            .bind(update.chronic_conditions.clone().map(Json))
            .bind(update.insurance_info.clone().map(Json))
            .fetch_optional(self.pool.as_ref())
            .await?;

        if updated.is_some() {
            info!(%patient_id, "patient updated");
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn deactivate_patient(&self, patient_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE patients SET is_active = FALSE WHERE patient_id = $1 AND is_active = TRUE",
        )
        .bind(patient_id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, vital), fields(vital_type = %vital.vital_type))]
    async fn record_vital(
        &self,
        patient_id: &str,
        vital: &NewVital,
    ) -> Result<VitalRecord, sqlx::Error> {
        let sql = format!(
            "INSERT INTO health_vitals (patient_id, vital_type, value, unit, recorded_at, recorded_by, notes)
             VALUES ($1, $2, $3, $4, COALESCE($5, NOW()), $6, $7)
             RETURNING {}",
            VITAL_COLUMNS
        );
        sqlx::query_as::<_, VitalRecord>(&sql)
            .bind(patient_id)
            .bind(&vital.vital_type)
            .bind(&vital.value)
            .bind(&vital.unit)
            .bind(vital.recorded_at)
            .bind(&vital.recorded_by)
            .bind(&vital.notes)
            .fetch_one(self.pool.as_ref())
            .await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}

/// `%term%` with the LIKE wildcards in `term` escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
