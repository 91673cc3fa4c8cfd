use serde::{Deserialize, Serialize};

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

impl ContextEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A request to the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System instruction prepended to every request.
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<ContextEntry>,
    /// The current user message. Empty when the history already ends with it.
    pub current_message: String,
    /// Ask the provider for a single JSON object instead of free text.
    #[serde(default)]
    pub json_mode: bool,
    /// Override the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A structured message for API-based providers (OpenAI, Anthropic, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

impl Context {
    /// Create a new context with just a current message and default system prompt.
    pub fn new(message: &str) -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history: Vec::new(),
            current_message: message.to_string(),
            json_mode: false,
            model: None,
        }
    }

    /// Create a context from an explicit system instruction and history.
    pub fn with_history(system_prompt: &str, history: Vec<ContextEntry>, message: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history,
            current_message: message.to_string(),
            json_mode: false,
            model: None,
        }
    }

    /// Request JSON output.
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Convert context to structured API messages.
    ///
    /// Returns `(system_prompt, messages)`. The system prompt is separated
    /// because Anthropic requires it outside the messages array.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        let mut messages = Vec::with_capacity(self.history.len() + 1);

        for entry in &self.history {
            messages.push(ApiMessage {
                role: entry.role.clone(),
                content: entry.content.clone(),
            });
        }

        if !self.current_message.is_empty() {
            messages.push(ApiMessage {
                role: "user".to_string(),
                content: self.current_message.clone(),
            });
        }

        (self.system_prompt.clone(), messages)
    }
}

/// Default system prompt for the agent.
fn default_system_prompt() -> String {
    "You are a helpful conversational agent. Be warm, concise, and accurate.".to_string()
}
