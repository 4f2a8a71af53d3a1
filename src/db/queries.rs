//! Record query tools. Each lookup is a single parameterized statement.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{Database, RecordSource};
use crate::models::patient::Patient;
use crate::models::records::{
    HistoryEntry, PatientRecords, PrescriptionRecord, ReportRecord, VitalRecord, VitalsQuery,
};

pub(crate) const PATIENT_COLUMNS: &str = "patient_id, user_id, first_name, last_name, date_of_birth, age, gender, \
     email, phone, address, emergency_contact, blood_type, allergies, \
     chronic_conditions, insurance_info, is_active, created_at, updated_at";

pub(crate) const VITAL_COLUMNS: &str =
    "vital_id, patient_id, vital_type, value, unit, recorded_at, recorded_by, notes";

const VITALS_SQL: &str = "SELECT vital_id, patient_id, vital_type, value, unit, recorded_at, recorded_by, notes
     FROM health_vitals
     WHERE patient_id = $1 AND is_active = TRUE
       AND ($2::text IS NULL OR vital_type = $2)
       AND ($3::timestamptz IS NULL OR recorded_at >= $3)
       AND ($4::timestamptz IS NULL OR recorded_at <= $4)
     ORDER BY recorded_at DESC
     LIMIT $5";

const PRESCRIPTIONS_SQL: &str = "SELECT p.prescription_id, p.medications, p.diagnosis, p.notes,
            p.prescribed_date, p.valid_until, p.is_active,
            d.first_name AS doctor_first_name, d.last_name AS doctor_last_name,
            d.specialization
     FROM prescriptions p
     LEFT JOIN doctors d ON p.doctor_id = d.doctor_id
     WHERE p.patient_id = $1 AND p.is_active = TRUE
     ORDER BY p.prescribed_date DESC
     LIMIT $2";

const ACTIVE_PRESCRIPTIONS_SQL: &str = "SELECT p.prescription_id, p.medications, p.diagnosis, p.notes,
            p.prescribed_date, p.valid_until, p.is_active,
            d.first_name AS doctor_first_name, d.last_name AS doctor_last_name,
            d.specialization
     FROM prescriptions p
     LEFT JOIN doctors d ON p.doctor_id = d.doctor_id
     WHERE p.patient_id = $1 AND p.is_active = TRUE
       AND (p.valid_until IS NULL OR p.valid_until >= CURRENT_DATE)
     ORDER BY p.prescribed_date DESC
     LIMIT $2";

const REPORTS_SQL: &str = "SELECT mr.report_id, mr.report_type, mr.title, mr.content,
            mr.file_url, mr.report_date,
            d.first_name AS doctor_first_name, d.last_name AS doctor_last_name,
            d.specialization
     FROM medical_reports mr
     LEFT JOIN doctors d ON mr.doctor_id = d.doctor_id
     WHERE mr.patient_id = $1 AND mr.is_active = TRUE
       AND ($2::text IS NULL OR mr.report_type = $2)
     ORDER BY mr.report_date DESC
     LIMIT $3";

const HISTORY_SQL: &str = "SELECT history_id, doctor_name, visit_date, diagnosis, health_status,
            blood_pressure, symptoms, notes, follow_up_date
     FROM medical_history
     WHERE patient_id = $1 AND is_active = TRUE
     ORDER BY visit_date DESC
     LIMIT $2";

impl Database {
    async fn medical_history(
        &self,
        patient_id: &str,
        limit: i64,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        sqlx::query_as::<_, HistoryEntry>(HISTORY_SQL)
            .bind(patient_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await
    }
}

#[async_trait]
impl RecordSource for Database {
    #[instrument(skip(self))]
    async fn patient_by_id(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM patients WHERE patient_id = $1 AND is_active = TRUE",
            PATIENT_COLUMNS
        );
        sqlx::query_as::<_, Patient>(&sql)
            .bind(patient_id)
            .fetch_optional(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn patient_records(
        &self,
        patient_id: &str,
        limit: i64,
    ) -> Result<Option<PatientRecords>, sqlx::Error> {
        let patient = match self.patient_by_id(patient_id).await? {
            Some(patient) => patient,
            None => return Ok(None),
        };

        let vitals_query = VitalsQuery {
            limit,
            ..VitalsQuery::for_patient(patient_id)
        };
        let (vitals, prescriptions, reports, history) = tokio::try_join!(
            self.health_vitals(&vitals_query),
            self.prescriptions(patient_id, false, limit),
            self.medical_reports(patient_id, None, limit),
            self.medical_history(patient_id, limit),
        )?;

        debug!(
            vitals = vitals.len(),
            prescriptions = prescriptions.len(),
            reports = reports.len(),
            history = history.len(),
            "loaded patient records"
        );

        Ok(Some(PatientRecords {
            patient,
            vitals,
            prescriptions,
            reports,
            history,
        }))
    }

    #[instrument(skip(self), fields(patient_id = %query.patient_id))]
    async fn health_vitals(&self, query: &VitalsQuery) -> Result<Vec<VitalRecord>, sqlx::Error> {
        sqlx::query_as::<_, VitalRecord>(VITALS_SQL)
            .bind(&query.patient_id)
            .bind(query.vital_type.as_deref())
            .bind(query.since)
            .bind(query.until)
            .bind(query.limit)
            .fetch_all(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn prescriptions(
        &self,
        patient_id: &str,
        active_only: bool,
        limit: i64,
    ) -> Result<Vec<PrescriptionRecord>, sqlx::Error> {
        let sql = if active_only {
            ACTIVE_PRESCRIPTIONS_SQL
        } else {
            PRESCRIPTIONS_SQL
        };
        sqlx::query_as::<_, PrescriptionRecord>(sql)
            .bind(patient_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn medical_reports(
        &self,
        patient_id: &str,
        report_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ReportRecord>, sqlx::Error> {
        sqlx::query_as::<_, ReportRecord>(REPORTS_SQL)
            .bind(patient_id)
            .bind(report_type)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await
    }
}
