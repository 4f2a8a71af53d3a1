//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use sqlx::types::Json;

use careagents::agents::AgentsConfig;
use careagents::config::WebSocketConfig;
use careagents::db::{HistoryStore, PatientStore, RecordSource};
use careagents::llm::{CompletionRequest, FragmentStream, LanguageModel, LlmError};
use careagents::memory::InMemoryStore;
use careagents::models::history::{HistoryUpdate, MedicalHistory, NewHistoryEntry, PageParams};
use careagents::models::patient::{NewPatient, Patient, PatientUpdate};
use careagents::models::records::{
    Medication, NewVital, PatientRecords, PrescriptionRecord, ReportRecord, VitalRecord,
    VitalsQuery,
};
use careagents::orchestrator::Orchestrator;
use careagents::state::AppState;

/// Model that replays a fixed answer.
#[derive(Default)]
pub struct ScriptedModel {
    pub fragments: Vec<String>,
    /// Fail after the scripted fragments (stream) or outright (complete).
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn answering(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_after(fragments: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::answering(fragments)
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, request: CompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
    }
}

fn overloaded() -> LlmError {
    LlmError::Api {
        status: 529,
        message: "Overloaded".into(),
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.record(request);
        if self.fail {
            return Err(overloaded());
        }
        Ok(self.fragments.concat())
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        self.record(request);
        let mut items: Vec<Result<String, LlmError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if self.fail {
            items.push(Err(overloaded()));
        }
        let delay = self.delay;
        Ok(stream::iter(items)
            .then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }
}

pub fn patient(id: &str) -> Patient {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Patient {
        patient_id: id.to_string(),
        user_id: None,
        first_name: "John".into(),
        last_name: "Carter".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1975, 9, 2).unwrap(),
        age: Some(48),
        gender: "Male".into(),
        email: Some("john.carter@example.com".into()),
        phone: None,
        address: None,
        emergency_contact: None,
        blood_type: Some("A+".into()),
        allergies: Json(vec![]),
        chronic_conditions: Json(vec!["Hypertension".into()]),
        insurance_info: None,
        is_active: true,
        created_at: at,
        updated_at: at,
    }
}

pub fn vital(patient_id: &str, vital_type: &str, value: &str) -> VitalRecord {
    VitalRecord {
        vital_id: format!("v-{}-{}", patient_id, vital_type),
        patient_id: patient_id.into(),
        vital_type: vital_type.into(),
        value: value.into(),
        unit: Some("mmHg".into()),
        recorded_at: Utc::now(),
        recorded_by: Some("Nurse Kim".into()),
        notes: None,
    }
}

pub fn prescription(id: &str) -> PrescriptionRecord {
    PrescriptionRecord {
        prescription_id: id.into(),
        medications: Json(vec![Medication {
            medication_name: Some("Lisinopril".into()),
            dosage: Some("10mg".into()),
            frequency: Some("once daily".into()),
            duration: None,
            instructions: None,
        }]),
        diagnosis: Some("Hypertension".into()),
        notes: None,
        prescribed_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        valid_until: None,
        is_active: true,
        doctor_first_name: Some("Amy".into()),
        doctor_last_name: Some("Chen".into()),
        specialization: Some("Cardiology".into()),
    }
}

/// In-memory stand-in for the Postgres-backed stores.
#[derive(Default)]
pub struct FakeDatabase {
    pub patients: Mutex<HashMap<String, Patient>>,
    pub vitals: Mutex<Vec<VitalRecord>>,
    pub prescriptions: Mutex<Vec<PrescriptionRecord>>,
    /// Visit history with its active flag.
    pub history: Mutex<Vec<(MedicalHistory, bool)>>,
    pub healthy: bool,
}

impl FakeDatabase {
    pub fn with_patient(id: &str) -> Self {
        let db = Self {
            healthy: true,
            ..Default::default()
        };
        db.patients.lock().unwrap().insert(id.into(), patient(id));
        db.vitals
            .lock()
            .unwrap()
            .push(vital(id, "blood_pressure", "128/84"));
        db.prescriptions.lock().unwrap().push(prescription("rx-1"));
        db
    }

    fn active(&self, patient_id: &str) -> Option<Patient> {
        self.patients
            .lock()
            .unwrap()
            .get(patient_id)
            .filter(|p| p.is_active)
            .cloned()
    }
}

#[async_trait]
impl RecordSource for FakeDatabase {
    async fn patient_by_id(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error> {
        Ok(self.active(patient_id))
    }

    async fn patient_records(
        &self,
        patient_id: &str,
        limit: i64,
    ) -> Result<Option<PatientRecords>, sqlx::Error> {
        let Some(patient) = self.active(patient_id) else {
            return Ok(None);
        };
        let query = VitalsQuery {
            limit,
            ..VitalsQuery::for_patient(patient_id)
        };
        Ok(Some(PatientRecords {
            patient,
            vitals: self.health_vitals(&query).await?,
            prescriptions: self.prescriptions(patient_id, false, limit).await?,
            reports: Vec::new(),
            history: Vec::new(),
        }))
    }

    async fn health_vitals(&self, query: &VitalsQuery) -> Result<Vec<VitalRecord>, sqlx::Error> {
        Ok(self
            .vitals
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.patient_id == query.patient_id)
            .filter(|v| query.vital_type.as_deref().map_or(true, |t| v.vital_type == t))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn prescriptions(
        &self,
        _patient_id: &str,
        _active_only: bool,
        limit: i64,
    ) -> Result<Vec<PrescriptionRecord>, sqlx::Error> {
        Ok(self
            .prescriptions
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn medical_reports(
        &self,
        _patient_id: &str,
        _report_type: Option<&str>,
        _limit: i64,
    ) -> Result<Vec<ReportRecord>, sqlx::Error> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl PatientStore for FakeDatabase {
    async fn create_patient(&self, new: &NewPatient) -> Result<Patient, sqlx::Error> {
        let id = format!("p-{}", self.patients.lock().unwrap().len() + 1);
        let mut created = patient(&id);
        created.first_name = new.first_name.clone();
        created.last_name = new.last_name.clone();
        created.date_of_birth = new.date_of_birth;
        created.gender = new.gender.clone();
        self.patients.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, sqlx::Error> {
        Ok(self.active(patient_id))
    }

    async fn list_patients(
        &self,
        active_only: bool,
        page: PageParams,
    ) -> Result<(Vec<Patient>, i64), sqlx::Error> {
        let mut patients: Vec<Patient> = self
            .patients
            .lock()
            .unwrap()
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        patients.sort_by(|a, b| (&a.last_name, &a.patient_id).cmp(&(&b.last_name, &b.patient_id)));
        let total = patients.len() as i64;
        let items = patients
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok((items, total))
    }

    async fn search_patients(&self, term: &str, limit: i64) -> Result<Vec<Patient>, sqlx::Error> {
        let term = term.to_lowercase();
        Ok(self
            .patients
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.is_active)
            .filter(|p| {
                p.full_name().to_lowercase().contains(&term)
                    || p.email.as_deref().map_or(false, |e| e.to_lowercase().contains(&term))
                    || p.phone.as_deref().map_or(false, |ph| ph.contains(&term))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
    ) -> Result<Option<Patient>, sqlx::Error> {
        let mut patients = self.patients.lock().unwrap();
        let Some(patient) = patients.get_mut(patient_id).filter(|p| p.is_active) else {
            return Ok(None);
        };
        if let Some(first_name) = &update.first_name {
            patient.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            patient.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone {
            patient.phone = Some(phone.clone());
        }
        if let Some(allergies) = &update.allergies {
            patient.allergies = Json(allergies.clone());
        }
        Ok(Some(patient.clone()))
    }

    async fn deactivate_patient(&self, patient_id: &str) -> Result<bool, sqlx::Error> {
        let mut patients = self.patients.lock().unwrap();
        match patients.get_mut(patient_id) {
            Some(p) if p.is_active => {
                p.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_vital(&self, patient_id: &str, new: &NewVital) -> Result<VitalRecord, sqlx::Error> {
        let mut recorded = vital(patient_id, &new.vital_type, &new.value);
        recorded.unit = new.unit.clone();
        self.vitals.lock().unwrap().push(recorded.clone());
        Ok(recorded)
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.healthy {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

pub fn history_entry(history_id: &str, patient_id: &str, visit_date: NaiveDate) -> MedicalHistory {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    MedicalHistory {
        history_id: history_id.into(),
        patient_id: patient_id.into(),
        doctor_id: None,
        doctor_name: "Dr. Amy Chen".into(),
        visit_date,
        diagnosis: Some("Seasonal allergies".into()),
        prescriptions: Json(vec![]),
        health_status: Some("Stable".into()),
        blood_pressure: Some("120/80".into()),
        symptoms: Json(vec!["sneezing".into()]),
        notes: None,
        follow_up_date: None,
        created_at: at,
        updated_at: at,
    }
}

#[async_trait]
impl HistoryStore for FakeDatabase {
    async fn create_history(&self, entry: &NewHistoryEntry) -> Result<MedicalHistory, sqlx::Error> {
        let mut history = self.history.lock().unwrap();
        let mut created = history_entry(&format!("h-{}", history.len() + 1), &entry.patient_id, entry.visit_date);
        created.doctor_name = entry.doctor_name.clone();
        created.diagnosis = entry.diagnosis.clone();
        created.prescriptions = Json(entry.prescriptions.clone());
        created.symptoms = Json(entry.symptoms.clone());
        created.follow_up_date = entry.follow_up_date;
        history.push((created.clone(), true));
        Ok(created)
    }

    async fn get_history(&self, history_id: &str) -> Result<Option<MedicalHistory>, sqlx::Error> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .find(|(h, active)| *active && h.history_id == history_id)
            .map(|(h, _)| h.clone()))
    }

    async fn patient_history(
        &self,
        patient_id: &str,
        page: PageParams,
    ) -> Result<(Vec<MedicalHistory>, i64), sqlx::Error> {
        let mut entries: Vec<MedicalHistory> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, active)| *active && h.patient_id == patient_id)
            .map(|(h, _)| h.clone())
            .collect();
        entries.sort_by(|a, b| b.visit_date.cmp(&a.visit_date));
        let total = entries.len() as i64;
        let items = entries
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok((items, total))
    }

    async fn update_history(
        &self,
        history_id: &str,
        update: &HistoryUpdate,
    ) -> Result<Option<MedicalHistory>, sqlx::Error> {
        let mut history = self.history.lock().unwrap();
        let Some((entry, _)) = history
            .iter_mut()
            .find(|(h, active)| *active && h.history_id == history_id)
        else {
            return Ok(None);
        };
        if let Some(diagnosis) = &update.diagnosis {
            entry.diagnosis = Some(diagnosis.clone());
        }
        if let Some(notes) = &update.notes {
            entry.notes = Some(notes.clone());
        }
        if let Some(follow_up_date) = update.follow_up_date {
            entry.follow_up_date = Some(follow_up_date);
        }
        Ok(Some(entry.clone()))
    }

    async fn deactivate_history(&self, history_id: &str) -> Result<bool, sqlx::Error> {
        let mut history = self.history.lock().unwrap();
        match history
            .iter_mut()
            .find(|(h, active)| *active && h.history_id == history_id)
        {
            Some((_, active)) => {
                *active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct Harness {
    pub state: web::Data<AppState>,
    pub model: Arc<ScriptedModel>,
    pub memory: Arc<InMemoryStore>,
    pub database: Arc<FakeDatabase>,
}

pub fn harness(model: ScriptedModel, database: FakeDatabase) -> Harness {
    let model = Arc::new(model);
    let memory = Arc::new(InMemoryStore::new(Duration::from_secs(600)));
    let database = Arc::new(database);

    let orchestrator = Orchestrator::new(
        model.clone(),
        memory.clone(),
        database.clone(),
        AgentsConfig::default(),
        50,
    );
    let state = web::Data::new(AppState {
        orchestrator: Arc::new(orchestrator),
        patients: database.clone(),
        history: database.clone(),
        websocket: WebSocketConfig::default(),
        model: "test-model".into(),
        model_configured: true,
    });

    Harness {
        state,
        model,
        memory,
        database,
    }
}
