use actix_web::{web, HttpRequest, HttpResponse, Resource};
use actix_web_actors::ws;
use serde::Deserialize;
use tracing::info;

use super::session::ChatSocket;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub patient_id: Option<String>,
}

/// `GET /ws/chat/{session_id}?patient_id=...`
pub fn websocket_route() -> Resource {
    web::resource("/ws/chat/{session_id}").route(web::get().to(chat_socket))
}

async fn chat_socket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    params: web::Query<ConnectParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let session_id = path.into_inner();
    let patient_id = params.into_inner().patient_id.filter(|id| !id.trim().is_empty());
    info!(%session_id, has_patient = patient_id.is_some(), "websocket connection requested");

    ws::start(ChatSocket::new(session_id, patient_id, state), &req, stream)
}
