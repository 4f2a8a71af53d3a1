//! REST handlers. Payloads are validated before anything reaches the
//! orchestrator or the database.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::chat::{
    ChatRequest, ChatResponse, GuestChatRequest, GuestChatResponse, RecordKind, RecordRequest,
};
use crate::models::history::{HistoryUpdate, NewHistoryEntry, PageParams, MAX_PAGE_SIZE};
use crate::models::patient::{NewPatient, PatientListParams, PatientUpdate};
use crate::models::records::{NewVital, VitalsQuery};
use crate::state::AppState;

type HandlerResult = Result<HttpResponse, AppError>;

const MAX_VITALS_PAGE: i64 = 500;

fn session_or_new(session_id: Option<String>) -> String {
    session_id.unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.patients.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "careagents",
            "database": "connected",
            "timestamp": Utc::now(),
        })),
        Err(e) => {
            warn!(error = %e, "health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": "careagents",
                "database": "unreachable",
                "timestamp": Utc::now(),
            }))
        }
    }
}

pub async fn chat_health(state: web::Data<AppState>) -> HttpResponse {
    if state.model_configured {
        HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "chat",
            "model": state.model,
        }))
    } else {
        HttpResponse::Ok().json(json!({
            "status": "unhealthy",
            "error": "language model API key is not configured",
        }))
    }
}

pub async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HandlerResult {
    let request = body.into_inner();
    request.validate()?;

    let session_id = session_or_new(request.session_id);
    let response = state
        .orchestrator
        .chat(&session_id, &request.message, request.patient_id.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ChatResponse {
        response,
        session_id,
    }))
}

pub async fn guest_chat(
    state: web::Data<AppState>,
    body: web::Json<GuestChatRequest>,
) -> HandlerResult {
    let request = body.into_inner();
    request.validate()?;

    let message = state
        .orchestrator
        .guest_chat(&request.message, &request.history)
        .await;

    Ok(HttpResponse::Ok().json(GuestChatResponse {
        message,
        session_id: Uuid::new_v4().to_string(),
    }))
}

async fn record(state: &AppState, kind: RecordKind, request: RecordRequest) -> HandlerResult {
    request.validate()?;
    let session_id = session_or_new(request.session_id);

    let text = state
        .orchestrator
        .record_request(
            kind,
            &request.patient_id,
            request.vital_type.as_deref(),
            request.days,
            |_| {},
        )
        .await?;

    let field = match kind {
        RecordKind::Vitals => "analysis",
        RecordKind::Summary | RecordKind::Prescriptions => "summary",
    };
    Ok(HttpResponse::Ok().json(json!({
        field: text,
        "patient_id": request.patient_id,
        "session_id": session_id,
    })))
}

pub async fn record_summary(
    state: web::Data<AppState>,
    body: web::Json<RecordRequest>,
) -> HandlerResult {
    record(&state, RecordKind::Summary, body.into_inner()).await
}

pub async fn record_vitals(
    state: web::Data<AppState>,
    body: web::Json<RecordRequest>,
) -> HandlerResult {
    record(&state, RecordKind::Vitals, body.into_inner()).await
}

pub async fn record_prescriptions(
    state: web::Data<AppState>,
    body: web::Json<RecordRequest>,
) -> HandlerResult {
    record(&state, RecordKind::Prescriptions, body.into_inner()).await
}

pub async fn clear_session(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let session_id = path.into_inner();
    state.orchestrator.clear_session(&session_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Session cleared successfully",
        "session_id": session_id,
    })))
}

pub async fn create_patient(
    state: web::Data<AppState>,
    body: web::Json<NewPatient>,
) -> HandlerResult {
    let patient = body.into_inner();
    patient.validate()?;

    let created = state.patients.create_patient(&patient).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn get_patient(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let patient_id = path.into_inner();
    match state.patients.get_patient(&patient_id).await? {
        Some(patient) => Ok(HttpResponse::Ok().json(patient)),
        None => Err(AppError::NotFound(format!("Patient {}", patient_id))),
    }
}

pub async fn list_patients(
    state: web::Data<AppState>,
    params: web::Query<PatientListParams>,
) -> HandlerResult {
    let params = params.into_inner();
    let paging = params.paging();
    paging.validate()?;

    let (patients, total) = state.patients.list_patients(params.active_only, paging).await?;
    Ok(paged("patients", patients, total, paging))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

pub async fn search_patients(
    state: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> HandlerResult {
    let params = params.into_inner();
    let term = params.q.trim();
    if term.chars().count() < 2 {
        return Err(AppError::Validation(
            "search query must be at least 2 characters".into(),
        ));
    }
    let limit = params.limit.unwrap_or(20);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let patients = state.patients.search_patients(term, limit).await?;
    Ok(HttpResponse::Ok().json(patients))
}

pub async fn update_patient(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PatientUpdate>,
) -> HandlerResult {
    let patient_id = path.into_inner();
    let update = body.into_inner();
    update.validate()?;

    match state.patients.update_patient(&patient_id, &update).await? {
        Some(patient) => Ok(HttpResponse::Ok().json(patient)),
        None => Err(AppError::NotFound(format!("Patient {}", patient_id))),
    }
}

pub async fn delete_patient(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let patient_id = path.into_inner();
    if !state.patients.deactivate_patient(&patient_id).await? {
        return Err(AppError::NotFound(format!("Patient {}", patient_id)));
    }
    info!(%patient_id, "patient deactivated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Patient deleted successfully",
        "patient_id": patient_id,
    })))
}

pub async fn record_vital(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<NewVital>,
) -> HandlerResult {
    let patient_id = path.into_inner();
    let vital = body.into_inner();
    vital.validate()?;

    if state.patients.get_patient(&patient_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Patient {}", patient_id)));
    }
    let recorded = state.patients.record_vital(&patient_id, &vital).await?;
    Ok(HttpResponse::Created().json(recorded))
}

#[derive(Debug, Deserialize)]
pub struct VitalsParams {
    pub vital_type: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_vitals(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<VitalsParams>,
) -> HandlerResult {
    let patient_id = path.into_inner();
    let params = params.into_inner();
    let limit = params.limit.unwrap_or(100);
    if !(1..=MAX_VITALS_PAGE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_VITALS_PAGE
        )));
    }

    let records = state.records();
    if records.patient_by_id(&patient_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Patient {}", patient_id)));
    }
    let query = VitalsQuery {
        vital_type: params.vital_type,
        limit,
        ..VitalsQuery::for_patient(patient_id)
    };
    let vitals = records.health_vitals(&query).await?;
    Ok(HttpResponse::Ok().json(vitals))
}

pub async fn create_history(
    state: web::Data<AppState>,
    body: web::Json<NewHistoryEntry>,
) -> HandlerResult {
    let entry = body.into_inner();
    entry.validate()?;

    if state.patients.get_patient(&entry.patient_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Patient {}", entry.patient_id)));
    }
    let created = state.history.create_history(&entry).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn get_history(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let history_id = path.into_inner();
    match state.history.get_history(&history_id).await? {
        Some(entry) => Ok(HttpResponse::Ok().json(entry)),
        None => Err(AppError::NotFound(format!("Medical history {}", history_id))),
    }
}

pub async fn patient_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<PageParams>,
) -> HandlerResult {
    let patient_id = path.into_inner();
    let paging = params.into_inner();
    paging.validate()?;

    let (records, total) = state.history.patient_history(&patient_id, paging).await?;
    Ok(paged("records", records, total, paging))
}

pub async fn update_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<HistoryUpdate>,
) -> HandlerResult {
    let history_id = path.into_inner();
    let update = body.into_inner();
    update.validate()?;

    match state.history.update_history(&history_id, &update).await? {
        Some(entry) => Ok(HttpResponse::Ok().json(entry)),
        None => Err(AppError::NotFound(format!("Medical history {}", history_id))),
    }
}

pub async fn delete_history(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let history_id = path.into_inner();
    if !state.history.deactivate_history(&history_id).await? {
        return Err(AppError::NotFound(format!("Medical history {}", history_id)));
    }
    info!(%history_id, "history entry deactivated");
    Ok(HttpResponse::NoContent().finish())
}

/// A page of `items` under `key`, with the paging totals alongside.
fn paged<T: Serialize>(key: &str, items: Vec<T>, total: i64, paging: PageParams) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        key: items,
        "total": total,
        "page": paging.page,
        "page_size": paging.page_size,
        "total_pages": paging.total_pages(total),
    }))
}

/// Malformed JSON bodies get the same error shape as validation failures.
pub fn json_error(err: actix_web::error::JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}
