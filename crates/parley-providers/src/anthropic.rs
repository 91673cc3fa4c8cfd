//! Anthropic Messages API provider.
//!
//! The Messages API has no JSON response format, so JSON mode adds an
//! instruction to the system prompt and prefills the assistant turn with `{`.

use async_trait::async_trait;
use parley_core::{
    config::AnthropicConfig,
    context::Context,
    error::ParleyError,
    message::{MessageMetadata, OutgoingMessage},
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const JSON_INSTRUCTION: &str = "Respond with a single JSON object and nothing else.";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &AnthropicConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContentBlock>>,
    model: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn build_request(context: &Context, default_model: &str, max_tokens: u32) -> AnthropicRequest {
    let (mut system, api_messages) = context.to_api_messages();
    let mut messages: Vec<AnthropicMessage> = api_messages
        .into_iter()
        .map(|m| AnthropicMessage {
            role: m.role,
            content: m.content,
        })
        .collect();

    if context.json_mode {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(JSON_INSTRUCTION);
        messages.push(AnthropicMessage {
            role: "assistant".to_string(),
            content: "{".to_string(),
        });
    }

    AnthropicRequest {
        model: context.model.as_deref().unwrap_or(default_model).to_string(),
        max_tokens,
        system,
        messages,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, ParleyError> {
        let start = Instant::now();
        let body = build_request(context, &self.model, self.max_tokens);

        debug!(
            "anthropic: POST {ANTHROPIC_API_URL} model={} json_mode={}",
            body.model, context.json_mode
        );

        let resp = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(format!("anthropic request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Provider(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
            ParleyError::Provider(format!("anthropic: failed to parse response: {e}"))
        })?;

        let mut text = parsed
            .content
            .as_ref()
            .and_then(|blocks| blocks.first())
            .map(|b| b.text.clone())
            .ok_or_else(|| ParleyError::Provider("anthropic: empty completion".to_string()))?;

        // The prefilled brace is not echoed back.
        if context.json_mode && !text.trim_start().starts_with('{') {
            text.insert(0, '{');
        }

        Ok(OutgoingMessage {
            text,
            metadata: MessageMetadata {
                provider_used: "anthropic".to_string(),
                tokens_used: parsed
                    .usage
                    .as_ref()
                    .map(|u| u.input_tokens + u.output_tokens),
                processing_time_ms: start.elapsed().as_millis() as u64,
                model: parsed.model,
            },
            ..Default::default()
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("anthropic: no API key configured");
            return false;
        }
        // No lightweight health endpoint; we trust the key is valid.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::from_config(&AnthropicConfig {
            api_key: "sk-ant-test".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_anthropic_provider_name() {
        let p = provider();
        assert_eq!(p.name(), "anthropic");
        assert!(p.requires_api_key());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let p = AnthropicProvider::from_config(&AnthropicConfig::default());
        assert!(!p.is_available().await);
        assert!(provider().is_available().await);
    }

    #[test]
    fn test_anthropic_request_serialization() {
        let ctx = Context::with_history("Be helpful.", Vec::new(), "Hello");
        let json = serde_json::to_value(build_request(&ctx, "claude-test", 512)).unwrap();
        assert_eq!(json["model"], "claude-test");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["system"], "Be helpful.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_anthropic_request_empty_system_omitted() {
        let ctx = Context::with_history("", Vec::new(), "Hello");
        let json = serde_json::to_value(build_request(&ctx, "claude-test", 512)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_json_mode_instructs_and_prefills() {
        let ctx = Context::with_history("Classify.", Vec::new(), "hi").json();
        let body = build_request(&ctx, "claude-test", 512);
        assert!(body.system.ends_with(JSON_INSTRUCTION));
        let last = body.messages.last().unwrap();
        assert_eq!(last.role, "assistant");
        assert_eq!(last.content, "{");
    }

    #[test]
    fn test_anthropic_response_parsing() {
        let json = r#"{"content":[{"type":"text","text":"Hello!"}],"model":"claude-sonnet-4-20250514","usage":{"input_tokens":10,"output_tokens":5}}"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text = resp
            .content
            .as_ref()
            .and_then(|b| b.first())
            .map(|b| b.text.clone());
        assert_eq!(text, Some("Hello!".into()));
        assert_eq!(
            resp.usage
                .as_ref()
                .map(|u| u.input_tokens + u.output_tokens),
            Some(15)
        );
    }
}
