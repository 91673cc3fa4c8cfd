//! HTTP delivery gateway.
//!
//! Posts each outbound unit to `{base_url}/send/individual` or
//! `{base_url}/send/group` and returns once the gateway accepts it. No
//! delivery receipt is awaited.

use async_trait::async_trait;
use parley_core::{
    config::DeliveryConfig, error::ParleyError, message::OutgoingMessage, traits::Channel,
};
use serde::Serialize;
use tracing::debug;

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
}

impl HttpGateway {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self, is_group: bool) -> String {
        let kind = if is_group { "group" } else { "individual" };
        format!("{}/send/{kind}", self.base_url)
    }
}

fn build_request(message: &OutgoingMessage) -> Result<SendRequest<'_>, ParleyError> {
    let target = message
        .reply_target
        .as_deref()
        .ok_or_else(|| ParleyError::Channel("no reply_target on outgoing message".into()))?;

    let (recipient, thread_id) = if message.is_group {
        (None, Some(target))
    } else {
        (Some(target), None)
    };

    Ok(SendRequest {
        recipient,
        thread_id,
        text: &message.text,
        service: message.service.as_deref(),
        account_id: message.account_id.as_deref(),
    })
}

#[async_trait]
impl Channel for HttpGateway {
    fn name(&self) -> &str {
        "http-gateway"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ParleyError> {
        let body = build_request(&message)?;
        let url = self.endpoint(message.is_group);
        debug!("gateway: POST {url} ({} chars)", message.text.chars().count());

        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("delivery request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Channel(format!(
                "delivery gateway returned {status}: {text}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing(target: &str, is_group: bool) -> OutgoingMessage {
        OutgoingMessage {
            text: "hello".into(),
            reply_target: Some(target.into()),
            is_group,
            service: Some("imessage".into()),
            account_id: Some("+15550109999".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_by_chat_type() {
        let gw = HttpGateway::new(&DeliveryConfig {
            base_url: "http://gw.local/".into(),
            ..Default::default()
        });
        assert_eq!(gw.endpoint(false), "http://gw.local/send/individual");
        assert_eq!(gw.endpoint(true), "http://gw.local/send/group");
    }

    #[test]
    fn test_individual_body_uses_recipient() {
        let msg = outgoing("+15550100000", false);
        let json = serde_json::to_value(build_request(&msg).unwrap()).unwrap();
        assert_eq!(json["recipient"], "+15550100000");
        assert!(json.get("thread_id").is_none());
        assert_eq!(json["text"], "hello");
        assert_eq!(json["service"], "imessage");
        assert_eq!(json["account_id"], "+15550109999");
    }

    #[test]
    fn test_group_body_uses_thread_id() {
        let msg = outgoing("thread-7", true);
        let json = serde_json::to_value(build_request(&msg).unwrap()).unwrap();
        assert_eq!(json["thread_id"], "thread-7");
        assert!(json.get("recipient").is_none());
    }

    #[test]
    fn test_missing_target_is_error() {
        let msg = OutgoingMessage {
            text: "x".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_request(&msg),
            Err(ParleyError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_channel_error() {
        let gw = HttpGateway::new(&DeliveryConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });
        let err = gw
            .send_to_individual("hi", "+15550100000", "sms", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Channel(_)));
    }
}
