//! Database module for CareAgents
//!
//! This module handles database connections, the record query tools used to
//! ground agent answers, and the patient repository behind the REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::models::history::{HistoryUpdate, MedicalHistory, NewHistoryEntry, PageParams};
use crate::models::patient::{NewPatient, Patient, PatientUpdate};
use crate::models::records::{
    NewVital, PatientRecords, PrescriptionRecord, ReportRecord, VitalRecord, VitalsQuery,
};

pub mod history;
pub mod queries;
pub mod repository;

/// Parameterized lookups scoped to one patient.
///
/// Every lookup only sees active rows. A missing patient is `Ok(None)`, not an
/// error; callers decide whether that is a 404 or a note in the prompt.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn patient_by_id(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error>;

    /// Patient plus recent vitals, prescriptions, reports and visit history,
    /// newest first, at most `limit` rows per category.
    async fn patient_records(
        &self,
        patient_id: &str,
        limit: i64,
    ) -> Result<Option<PatientRecords>, sqlx::Error>;

    async fn health_vitals(&self, query: &VitalsQuery) -> Result<Vec<VitalRecord>, sqlx::Error>;

    async fn prescriptions(
        &self,
        patient_id: &str,
        active_only: bool,
        limit: i64,
    ) -> Result<Vec<PrescriptionRecord>, sqlx::Error>;

    async fn medical_reports(
        &self,
        patient_id: &str,
        report_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ReportRecord>, sqlx::Error>;
}

/// Writes and direct reads behind the patient REST endpoints.
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn create_patient(&self, patient: &NewPatient) -> Result<Patient, sqlx::Error>;

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error>;

    /// One page of patients by last name, and the total matching count.
    async fn list_patients(
        &self,
        active_only: bool,
        page: PageParams,
    ) -> Result<(Vec<Patient>, i64), sqlx::Error>;

    /// Active patients whose name, email or phone contains `term`.
    async fn search_patients(&self, term: &str, limit: i64) -> Result<Vec<Patient>, sqlx::Error>;

    /// `None` when no active patient matched.
    async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
    ) -> Result<Option<Patient>, sqlx::Error>;

    /// Soft delete. Returns false when no active patient matched.
    async fn deactivate_patient(&self, patient_id: &str) -> Result<bool, sqlx::Error>;

    async fn record_vital(&self, patient_id: &str, vital: &NewVital)
        -> Result<VitalRecord, sqlx::Error>;

    /// Round-trip to the database.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Visit history CRUD. Deleted entries are deactivated, never removed.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_history(&self, entry: &NewHistoryEntry) -> Result<MedicalHistory, sqlx::Error>;

    async fn get_history(&self, history_id: &str) -> Result<Option<MedicalHistory>, sqlx::Error>;

    /// Newest visits first, with the patient's total entry count.
    async fn patient_history(
        &self,
        patient_id: &str,
        page: PageParams,
    ) -> Result<(Vec<MedicalHistory>, i64), sqlx::Error>;

    async fn update_history(
        &self,
        history_id: &str,
        update: &HistoryUpdate,
    ) -> Result<Option<MedicalHistory>, sqlx::Error>;

    async fn deactivate_history(&self, history_id: &str) -> Result<bool, sqlx::Error>;
}

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
