//! Chat orchestration: route a message to an agent, ground it in patient
//! records, talk to the model and keep session memory.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::agents::context::{
    render_missing, render_patient_records, render_prescriptions, render_vitals,
};
use crate::agents::prompts::{self, GUEST_APOLOGY};
use crate::agents::{classify_query, AgentProfile, AgentType, AgentsConfig, Route};
use crate::db::RecordSource;
use crate::error::AppError;
use crate::llm::{CompletionRequest, LanguageModel, LlmError};
use crate::memory::MemoryStore;
use crate::models::chat::{ChatMessage, RecordKind, SessionContext};
use crate::models::records::VitalsQuery;

/// Rows per category fetched to ground a chat answer.
const GROUNDING_LIMIT: i64 = 100;
const PRESCRIPTION_LIMIT: i64 = 50;
/// History messages a guest may send along.
const GUEST_HISTORY: usize = 10;

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    records: Arc<dyn RecordSource>,
    agents: AgentsConfig,
    history_limit: usize,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        records: Arc<dyn RecordSource>,
        agents: AgentsConfig,
        history_limit: usize,
    ) -> Self {
        Self {
            model,
            memory,
            records,
            agents,
            history_limit,
        }
    }

    pub fn welcome_message(&self) -> &str {
        &self.agents.chat.welcome_message
    }

    pub fn records(&self) -> Arc<dyn RecordSource> {
        self.records.clone()
    }

    /// Which agent `route_query` would hand this message to.
    pub fn agent_for(&self, message: &str, patient_id: Option<&str>) -> AgentType {
        match classify_query(message, patient_id.is_some()) {
            Route::Chat => AgentType::Chat,
            _ => AgentType::Record,
        }
    }

    /// Answer a session message, relaying fragments as they arrive.
    ///
    /// Memory is only written once the whole answer is in hand, so a failed
    /// call leaves the session as it was.
    #[instrument(skip(self, message, on_fragment), fields(chars = message.len()))]
    pub async fn stream_chat<F>(
        &self,
        session_id: &str,
        message: &str,
        patient_id: Option<&str>,
        mut on_fragment: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        let (request, context) = self.chat_request(session_id, message, patient_id).await?;
        let response = self.stream_text(request, &mut on_fragment).await?;
        self.remember(session_id, message, &response, patient_id, context)
            .await?;
        Ok(response)
    }

    /// Answer a session message in one piece.
    #[instrument(skip(self, message), fields(chars = message.len()))]
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        patient_id: Option<&str>,
    ) -> Result<String, AppError> {
        let (request, context) = self.chat_request(session_id, message, patient_id).await?;
        let response = self.model.complete(request).await?;
        self.remember(session_id, message, &response, patient_id, context)
            .await?;
        Ok(response)
    }

    /// Send a free-text message to the record agent when it asks for a
    /// record category about a known patient, otherwise to the chat agent.
    pub async fn route_query<F>(
        &self,
        session_id: &str,
        message: &str,
        patient_id: Option<&str>,
        on_fragment: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        let route = classify_query(message, patient_id.is_some());
        debug!(?route, "routed query");
        match (route, patient_id) {
            (Route::Vitals, Some(id)) => self.analyze_vitals(id, None, 30, on_fragment).await,
            (Route::Prescriptions, Some(id)) => self.summarize_prescriptions(id, on_fragment).await,
            (Route::Summary, Some(id)) => self.patient_summary(id, on_fragment).await,
            _ => {
                self.stream_chat(session_id, message, patient_id, on_fragment)
                    .await
            }
        }
    }

    /// Run one record-agent operation by category.
    pub async fn record_request<F>(
        &self,
        kind: RecordKind,
        patient_id: &str,
        vital_type: Option<&str>,
        days: u32,
        on_fragment: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        match kind {
            RecordKind::Summary => self.patient_summary(patient_id, on_fragment).await,
            RecordKind::Vitals => {
                self.analyze_vitals(patient_id, vital_type, days, on_fragment)
                    .await
            }
            RecordKind::Prescriptions => {
                self.summarize_prescriptions(patient_id, on_fragment).await
            }
        }
    }

    #[instrument(skip(self, on_fragment))]
    pub async fn patient_summary<F>(&self, patient_id: &str, mut on_fragment: F) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        let records = self
            .records
            .patient_records(patient_id, GROUNDING_LIMIT)
            .await?
            .ok_or_else(|| patient_not_found(patient_id))?;
        let data = render_patient_records(&records);
        let request = record_prompt(&self.agents.record, prompts::summary_request(), &data);
        self.stream_text(request, &mut on_fragment).await
    }

    #[instrument(skip(self, on_fragment))]
    pub async fn analyze_vitals<F>(
        &self,
        patient_id: &str,
        vital_type: Option<&str>,
        days: u32,
        mut on_fragment: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        self.require_patient(patient_id).await?;

        let until = Utc::now();
        let since = until - Duration::days(i64::from(days));
        let query = VitalsQuery {
            vital_type: vital_type.map(str::to_string),
            since: Some(since),
            until: Some(until),
            ..VitalsQuery::for_patient(patient_id)
        };
        let vitals = self.records.health_vitals(&query).await?;
        debug!(rows = vitals.len(), "vitals fetched");

        let request = record_prompt(
            &self.agents.record,
            prompts::vitals_request(vital_type, since, until),
            &render_vitals(&vitals),
        );
        self.stream_text(request, &mut on_fragment).await
    }

    #[instrument(skip(self, on_fragment))]
    pub async fn summarize_prescriptions<F>(
        &self,
        patient_id: &str,
        mut on_fragment: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str) + Send,
    {
        self.require_patient(patient_id).await?;
        let prescriptions = self
            .records
            .prescriptions(patient_id, true, PRESCRIPTION_LIMIT)
            .await?;

        let request = record_prompt(
            &self.agents.record,
            prompts::prescriptions_request(),
            &render_prescriptions(&prescriptions),
        );
        self.stream_text(request, &mut on_fragment).await
    }

    /// Stateless answer for visitors. Never fails: model errors become an
    /// apology.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn guest_chat(&self, message: &str, history: &[ChatMessage]) -> String {
        let skip = history.len().saturating_sub(GUEST_HISTORY);
        let mut messages: Vec<ChatMessage> = history[skip..]
            .iter()
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect();
        messages.push(ChatMessage::user(message));

        let profile = &self.agents.guest;
        let request = CompletionRequest {
            system: profile.system_prompt.clone(),
            messages,
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };
        match self.model.complete(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => GUEST_APOLOGY.to_string(),
            Err(e) => {
                warn!(error = %e, "guest chat failed");
                GUEST_APOLOGY.to_string()
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn clear_session(&self, session_id: &str) -> Result<(), AppError> {
        self.memory.clear(session_id).await?;
        info!("session cleared");
        Ok(())
    }

    async fn require_patient(&self, patient_id: &str) -> Result<(), AppError> {
        match self.records.patient_by_id(patient_id).await? {
            Some(_) => Ok(()),
            None => Err(patient_not_found(patient_id)),
        }
    }

    async fn chat_request(
        &self,
        session_id: &str,
        message: &str,
        patient_id: Option<&str>,
    ) -> Result<(CompletionRequest, SessionContext), AppError> {
        let mut messages = self.memory.history(session_id, self.history_limit).await?;
        let context = self.memory.context(session_id).await?;

        let profile = &self.agents.chat;
        let system = match patient_id.or(context.patient_id.as_deref()) {
            Some(id) => {
                let grounding = match self.records.patient_records(id, GROUNDING_LIMIT).await? {
                    Some(records) => render_patient_records(&records),
                    None => render_missing(id),
                };
                prompts::with_patient_context(&profile.system_prompt, &grounding)
            }
            None => profile.system_prompt.clone(),
        };

        messages.push(ChatMessage::user(message));
        let request = CompletionRequest {
            system,
            messages,
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };
        Ok((request, context))
    }

    async fn stream_text(
        &self,
        request: CompletionRequest,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, AppError> {
        let mut stream = self.model.stream(request).await?;
        let mut full = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            full.push_str(&fragment);
        }
        if full.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(full)
    }

    async fn remember(
        &self,
        session_id: &str,
        message: &str,
        response: &str,
        patient_id: Option<&str>,
        context: SessionContext,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let context = patient_id
            .filter(|id| context.patient_id.as_deref() != Some(*id))
            .map(|id| SessionContext {
                patient_id: Some(id.to_string()),
            });
        self.memory
            .commit(
                session_id,
                &[
                    ChatMessage::user(message).stamped(now),
                    ChatMessage::assistant(response).stamped(now),
                ],
                context.as_ref(),
            )
            .await?;
        Ok(())
    }
}

fn patient_not_found(patient_id: &str) -> AppError {
    AppError::NotFound(format!("Patient {}", patient_id))
}

fn record_prompt(profile: &AgentProfile, instruction: String, data: &str) -> CompletionRequest {
    CompletionRequest {
        system: profile.system_prompt.clone(),
        messages: vec![ChatMessage::user(format!("{}\n\n{}", instruction, data))],
        temperature: profile.temperature,
        max_tokens: profile.max_tokens,
    }
}
