use futures::TryStreamExt as _;
use relay_core::CompletionRequest;
use tracing::{debug, warn};

use super::{BoxError, ByteStream, OpenAiConfig, Upstream, UpstreamError};
use crate::config::ConfigError;

/// Upstream adapter for OpenAI's chat completions API (streaming).
pub struct OpenAiUpstream {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiUpstream {
    /// Creates an adapter from explicit configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::missing("OPENAI_API_KEY"));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::Client(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl Upstream for OpenAiUpstream {
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream, UpstreamError> {
        let body = build_request_body(request);
        debug!(model = %request.model, messages = request.messages.len(), "opening upstream completion stream");

        let response = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(status = status.as_u16(), "upstream rejected completion request");
            return Err(UpstreamError::status(status.as_u16(), body));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map_err(|e| -> BoxError { Box::new(e) }),
        ))
    }
}

pub(crate) fn build_request_body(request: &CompletionRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model.as_str(),
        "messages": request.messages,
        "temperature": request.temperature,
        "stream": true,
    });
    if let Some(value) = request.presence_penalty {
        body["presence_penalty"] = serde_json::json!(value);
    }
    if let Some(value) = request.frequency_penalty {
        body["frequency_penalty"] = serde_json::json!(value);
    }
    if let Some(value) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(value);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{ChatMessage, ModelId};

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            ModelId::Gpt4o,
            vec![ChatMessage::system("Be kind."), ChatMessage::user("Review my essay.")],
            0.4,
        )
    }

    #[test]
    fn request_body_enables_streaming_and_omits_unset_sampling() {
        let body = build_request_body(&request());
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(body.get("model").and_then(|v| v.as_str()), Some("gpt-4o"));
        assert_eq!(
            body.pointer("/messages/1/role").and_then(|v| v.as_str()),
            Some("user")
        );
        assert!(body.get("presence_penalty").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn request_body_carries_optional_sampling() {
        let body = build_request_body(
            &request()
                .presence_penalty(0.5)
                .frequency_penalty(-1.0)
                .max_tokens(256),
        );
        assert_eq!(body.get("presence_penalty").and_then(|v| v.as_f64()), Some(0.5));
        assert_eq!(body.get("frequency_penalty").and_then(|v| v.as_f64()), Some(-1.0));
        assert_eq!(body.get("max_tokens").and_then(|v| v.as_u64()), Some(256));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            OpenAiUpstream::new(OpenAiConfig::new("  ")),
            Err(ConfigError::Missing { .. })
        ));
    }
}
