use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler, WrapFuture};
use actix_web::web;
use actix_web_actors::ws;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{codes, AppError};
use crate::models::chat::{validate_message, RecordKind, MAX_MESSAGE_CHARS};
use crate::models::envelope::{AgentType, ClientMessage, EnvelopeError, ServerMessage};
use crate::state::AppState;

/// One unit of work requested by the client.
#[derive(Debug, Clone, PartialEq)]
enum Job {
    Chat {
        message: String,
        patient_id: Option<String>,
        stream: bool,
        auto_route: bool,
    },
    Record {
        kind: RecordKind,
        patient_id: String,
        vital_type: Option<String>,
        days: u32,
    },
}

/// Turn a client frame into a job, filling in the connection's patient.
fn plan(message: ClientMessage, connection_patient: Option<&str>) -> Result<Job, AppError> {
    match message {
        ClientMessage::ChatMessage {
            message,
            patient_id,
            stream,
            auto_route,
        } => {
            validate_message(&message).map_err(|_| {
                AppError::Validation(format!(
                    "message must contain between 1 and {} characters",
                    MAX_MESSAGE_CHARS
                ))
            })?;
            Ok(Job::Chat {
                message,
                patient_id: patient_id.or_else(|| connection_patient.map(str::to_string)),
                stream,
                auto_route,
            })
        }
        ClientMessage::RecordRequest {
            request_type,
            patient_id,
            vital_type,
            days,
        } => {
            let patient_id = patient_id
                .or_else(|| connection_patient.map(str::to_string))
                .ok_or_else(|| {
                    AppError::Validation("patient_id is required for record requests".into())
                })?;
            if !(1..=365).contains(&days) {
                return Err(AppError::Validation("days must be between 1 and 365".into()));
            }
            Ok(Job::Record {
                kind: request_type,
                patient_id,
                vital_type,
                days,
            })
        }
    }
}

fn emit(tx: &UnboundedSender<ServerMessage>, frame: ServerMessage) {
    if tx.unbounded_send(frame).is_err() {
        debug!("connection gone, frame dropped");
    }
}

/// Run a job to completion, framing its output as
/// typing, stream_start, chunks, stream_end (or error), typing.
async fn run(state: web::Data<AppState>, session_id: String, job: Job, tx: UnboundedSender<ServerMessage>) {
    let orchestrator = &state.orchestrator;
    emit(&tx, ServerMessage::typing(true));

    let outcome = match job {
        Job::Chat {
            message,
            patient_id,
            stream: true,
            auto_route,
        } => {
            let agent = if auto_route {
                orchestrator.agent_for(&message, patient_id.as_deref())
            } else {
                AgentType::Chat
            };
            emit(&tx, ServerMessage::stream_start(agent));

            let chunks = tx.clone();
            let sink = move |fragment: &str| emit(&chunks, ServerMessage::stream_chunk(fragment));
            let result = if auto_route {
                orchestrator
                    .route_query(&session_id, &message, patient_id.as_deref(), sink)
                    .await
            } else {
                orchestrator
                    .stream_chat(&session_id, &message, patient_id.as_deref(), sink)
                    .await
            };
            result.map(ServerMessage::stream_end)
        }
        Job::Chat {
            message,
            patient_id,
            stream: false,
            auto_route,
        } => {
            let result = if auto_route {
                orchestrator
                    .route_query(&session_id, &message, patient_id.as_deref(), |_| {})
                    .await
            } else {
                orchestrator
                    .chat(&session_id, &message, patient_id.as_deref())
                    .await
            };
            result.map(ServerMessage::chat_response)
        }
        Job::Record {
            kind,
            patient_id,
            vital_type,
            days,
        } => {
            emit(&tx, ServerMessage::stream_start(AgentType::Record));
            let chunks = tx.clone();
            orchestrator
                .record_request(kind, &patient_id, vital_type.as_deref(), days, move |fragment: &str| {
                    emit(&chunks, ServerMessage::stream_chunk(fragment))
                })
                .await
                .map(ServerMessage::stream_end)
        }
    };

    match outcome {
        Ok(frame) => emit(&tx, frame),
        Err(e) => {
            warn!(%session_id, error = %e, code = e.code(), "chat request failed");
            emit(&tx, ServerMessage::error(e.public_message(), e.code()));
        }
    }
    emit(&tx, ServerMessage::typing(false));
}

/// WebSocket session actor.
pub struct ChatSocket {
    session_id: String,
    patient_id: Option<String>,
    state: web::Data<AppState>,
    heartbeat: Instant,
    busy: bool,
    outbound: UnboundedSender<ServerMessage>,
    inbox: Option<UnboundedReceiver<ServerMessage>>,
}

impl ChatSocket {
    pub fn new(session_id: String, patient_id: Option<String>, state: web::Data<AppState>) -> Self {
        let (outbound, inbox) = mpsc::unbounded();
        Self {
            session_id,
            patient_id,
            state,
            heartbeat: Instant::now(),
            busy: false,
            outbound,
            inbox: Some(inbox),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let interval = Duration::from_secs(self.state.websocket.ping_interval.max(1));
        let timeout = Duration::from_secs(self.state.websocket.client_timeout);
        ctx.run_interval(interval, move |act, ctx| {
            if Instant::now().duration_since(act.heartbeat) > timeout {
                info!(session_id = %act.session_id, "websocket heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn reject(&self, error: impl Into<String>, code: &str) {
        emit(&self.outbound, ServerMessage::error(error, code));
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e @ EnvelopeError::UnknownType(_)) => {
                return self.reject(e.to_string(), codes::INVALID_MESSAGE_TYPE)
            }
            Err(e @ EnvelopeError::Malformed(_)) => {
                return self.reject(e.to_string(), codes::INVALID_MESSAGE)
            }
        };

        if self.busy {
            return self.reject(
                "A response is already in progress for this session",
                codes::SESSION_BUSY,
            );
        }

        let job = match plan(message, self.patient_id.as_deref()) {
            Ok(job) => job,
            Err(e) => return self.reject(e.public_message(), e.code()),
        };

        self.busy = true;
        let work = run(
            self.state.clone(),
            self.session_id.clone(),
            job,
            self.outbound.clone(),
        );
        ctx.spawn(work.into_actor(self).map(|_, act, _| act.busy = false));
    }
}

impl Actor for ChatSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Some(inbox) = self.inbox.take() {
            ctx.add_stream(inbox);
        }
        self.start_heartbeat(ctx);

        let welcome = self.state.orchestrator.welcome_message().to_string();
        emit(
            &self.outbound,
            ServerMessage::connected(self.session_id.clone(), welcome),
        );
        info!(session_id = %self.session_id, "websocket connected");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session_id = %self.session_id, "websocket disconnected");
    }
}

/// Frames coming from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket protocol error");
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => {
                self.heartbeat = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => {
                self.heartbeat = Instant::now();
            }
            ws::Message::Text(text) => {
                self.heartbeat = Instant::now();
                self.handle_text(&text, ctx);
            }
            ws::Message::Binary(_) => {
                self.reject("Binary frames are not supported", codes::INVALID_MESSAGE);
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop => {}
        }
    }
}

/// Frames going to the client, in channel order.
impl StreamHandler<ServerMessage> for ChatSocket {
    fn handle(&mut self, frame: ServerMessage, ctx: &mut Self::Context) {
        match serde_json::to_string(&frame) {
            Ok(json) => ctx.text(json),
            Err(e) => warn!(error = %e, kind = frame.kind(), "failed to encode frame"),
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}
