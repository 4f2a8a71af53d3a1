//! Agent roles and the text they are given.
//!
//! An agent is a profile (system prompt, temperature, token budget) applied
//! to the shared language model. Profiles come from configuration; any field
//! left out keeps the role's built-in value.

use serde::Deserialize;

pub mod context;
pub mod prompts;
pub mod router;

pub use crate::models::envelope::AgentType;
pub use router::{classify_query, Route};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub welcome_message: String,
}

impl AgentProfile {
    pub fn chat() -> Self {
        Self {
            name: "chat_agent".into(),
            system_prompt: prompts::CHAT_SYSTEM_PROMPT.into(),
            temperature: 0.7,
            max_tokens: 4096,
            welcome_message: prompts::CHAT_WELCOME.into(),
        }
    }

    pub fn record() -> Self {
        Self {
            name: "record_agent".into(),
            system_prompt: prompts::RECORD_SYSTEM_PROMPT.into(),
            temperature: 0.1,
            max_tokens: 4096,
            welcome_message: prompts::CHAT_WELCOME.into(),
        }
    }

    pub fn guest() -> Self {
        Self {
            name: "guest_agent".into(),
            system_prompt: prompts::GUEST_SYSTEM_PROMPT.into(),
            temperature: 0.7,
            max_tokens: 2048,
            welcome_message: prompts::GUEST_WELCOME.into(),
        }
    }

    fn apply(mut self, overrides: ProfileOverrides) -> Self {
        if let Some(name) = overrides.name {
            self.name = name;
        }
        if let Some(prompt) = overrides.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(welcome) = overrides.welcome_message {
            self.welcome_message = welcome;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProfileOverrides {
    name: Option<String>,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    welcome_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAgentsConfig {
    chat: ProfileOverrides,
    record: ProfileOverrides,
    guest: ProfileOverrides,
}

/// The three role profiles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAgentsConfig")]
pub struct AgentsConfig {
    pub chat: AgentProfile,
    pub record: AgentProfile,
    pub guest: AgentProfile,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            chat: AgentProfile::chat(),
            record: AgentProfile::record(),
            guest: AgentProfile::guest(),
        }
    }
}

impl From<RawAgentsConfig> for AgentsConfig {
    fn from(raw: RawAgentsConfig) -> Self {
        Self {
            chat: AgentProfile::chat().apply(raw.chat),
            record: AgentProfile::record().apply(raw.record),
            guest: AgentProfile::guest().apply(raw.guest),
        }
    }
}

impl AgentsConfig {
    pub fn profile(&self, agent: AgentType) -> &AgentProfile {
        match agent {
            AgentType::Chat => &self.chat,
            AgentType::Record => &self.record,
            AgentType::Guest => &self.guest,
        }
    }
}
