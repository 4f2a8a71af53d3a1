use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::sse::{SseDecoder, SseEvent};
use super::{CompletionRequest, FragmentStream, LanguageModel, LlmError};
use crate::config::LlmConfig;

/// Client for a hosted Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    api_version: String,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();
        json!({
            "model": self.model,
            "system": request.system,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": stream,
        })
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&self.body(request, stream));
        // A total timeout would cut long streams short.
        if !stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model API returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let response: Value = self.send(&request, false).await?.json().await?;
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Malformed("response has no content array".into()))?;

        let text: String = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        let response = self.send(&request, true).await?;
        debug!("model stream opened");
        Ok(fragments(response.bytes_stream().boxed()))
    }
}

/// What one SSE event means for the fragment stream.
#[derive(Debug, PartialEq)]
enum StreamSignal {
    Text(String),
    Stop,
    Failed(String),
    Ignore,
}

fn interpret(event: &SseEvent) -> StreamSignal {
    let payload: Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(e) => return StreamSignal::Failed(format!("undecodable event data: {}", e)),
    };
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .or(event.event.as_deref())
        .unwrap_or_default();

    match kind {
        "content_block_delta" => match payload.pointer("/delta/text").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => StreamSignal::Text(text.to_string()),
            _ => StreamSignal::Ignore,
        },
        "message_stop" => StreamSignal::Stop,
        "error" => StreamSignal::Failed(
            payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error")
                .to_string(),
        ),
        _ => StreamSignal::Ignore,
    }
}

struct StreamState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    done: bool,
}

impl<S> StreamState<S> {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.done {
                return;
            }
            match interpret(&event) {
                StreamSignal::Text(text) => self.pending.push_back(Ok(text)),
                StreamSignal::Stop => self.done = true,
                StreamSignal::Failed(message) => {
                    self.pending.push_back(Err(LlmError::Api { status: 200, message }));
                    self.done = true;
                }
                StreamSignal::Ignore => {}
            }
        }
    }
}

fn fragments<S, B>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = StreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::Transport(e)), state));
                }
                None => {
                    let tail = state.decoder.finish().into_iter().collect();
                    state.absorb(tail);
                    if !state.done {
                        state.done = true;
                        state.pending.push_back(Err(LlmError::Malformed(
                            "stream ended before message_stop".into(),
                        )));
                    }
                }
            }
        }
    })
    .boxed()
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
