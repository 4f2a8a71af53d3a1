//! Visit history written by clinicians. The grounding query in `queries`
//! reads the same table.

use async_trait::async_trait;
use sqlx::types::Json;
use tracing::{info, instrument};

use super::{Database, HistoryStore};
use crate::models::history::{HistoryUpdate, MedicalHistory, NewHistoryEntry, PageParams};

const HISTORY_COLUMNS: &str = "history_id, patient_id, doctor_id, doctor_name, visit_date, diagnosis, \
     prescriptions, health_status, blood_pressure, symptoms, notes, follow_up_date, \
     created_at, updated_at";

#[async_trait]
impl HistoryStore for Database {
    #[instrument(skip(self, entry), fields(patient_id = %entry.patient_id))]
    async fn create_history(&self, entry: &NewHistoryEntry) -> Result<MedicalHistory, sqlx::Error> {
        let sql = format!(
            "INSERT INTO medical_history (
                patient_id, doctor_id, doctor_name, visit_date, diagnosis, prescriptions,
                health_status, blood_pressure, symptoms, notes, follow_up_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}",
            HISTORY_COLUMNS
        );

        let created = sqlx::query_as::<_, MedicalHistory>(&sql)
            .bind(&entry.patient_id)
            .bind(&entry.doctor_id)
            .bind(&entry.doctor_name)
            .bind(entry.visit_date)
            .bind(&entry.diagnosis)
            .bind(Json(entry.prescriptions.clone()))
            .bind(&entry.health_status)
            .bind(&entry.blood_pressure)
            .bind(Json(entry.symptoms.clone()))
            .bind(&entry.notes)
            .bind(entry.follow_up_date)
            .fetch_one(self.pool.as_ref())
            .await?;

        info!(history_id = %created.history_id, "history entry created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_history(&self, history_id: &str) -> Result<Option<MedicalHistory>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medical_history WHERE history_id = $1 AND is_active = TRUE",
            HISTORY_COLUMNS
        );
        sqlx::query_as::<_, MedicalHistory>(&sql)
            .bind(history_id)
            .fetch_optional(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn patient_history(
        &self,
        patient_id: &str,
        page: PageParams,
    ) -> Result<(Vec<MedicalHistory>, i64), sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM medical_history
             WHERE patient_id = $1 AND is_active = TRUE
             ORDER BY visit_date DESC, created_at DESC
             LIMIT $2 OFFSET $3",
            HISTORY_COLUMNS
        );
        let entries = sqlx::query_as::<_, MedicalHistory>(&sql)
            .bind(patient_id)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(self.pool.as_ref())
            .await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM medical_history WHERE patient_id = $1 AND is_active = TRUE",
        )
        .bind(patient_id)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok((entries, total))
    }

    #[instrument(skip(self, update))]
    async fn update_history(
        &self,
        history_id: &str,
        update: &HistoryUpdate,
    ) -> Result<Option<MedicalHistory>, sqlx::Error> {
        let sql = format!(
            "UPDATE medical_history SET
                doctor_id = COALESCE($2, doctor_id),
                doctor_name = COALESCE($3, doctor_name),
                visit_date = COALESCE($4, visit_date),
                diagnosis = COALESCE($5, diagnosis),
                prescriptions = COALESCE($6, prescriptions),
                health_status = COALESCE($7, health_status),
                blood_pressure = COALESCE($8, blood_pressure),
                symptoms = COALESCE($9, symptoms),
                notes = COALESCE($10, notes),
                follow_up_date = COALESCE($11, follow_up_date)
             WHERE history_id = $1 AND is_active = TRUE
             RETURNING {}",
            HISTORY_COLUMNS
        );
        sqlx::query_as::<_, MedicalHistory>(&sql)
            .bind(history_id)
            .bind(&update.doctor_id)
            .bind(&update.doctor_name)
            .bind(update.visit_date)
            .bind(&update.diagnosis)
            .bind(update.prescriptions.clone().map(Json))
            .bind(&update.health_status)
            .bind(&update.blood_pressure)
            .bind(update.symptoms.clone().map(Json))
            .bind(&update.notes)
            .bind(update.follow_up_date)
            .fetch_optional(self.pool.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn deactivate_history(&self, history_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE medical_history SET is_active = FALSE WHERE history_id = $1 AND is_active = TRUE",
        )
        .bind(history_id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
