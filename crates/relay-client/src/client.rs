use std::time::Duration;

use relay_core::CompletionRequest;
use relay_core::wire::COMPLETION_STREAM_PATH;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::reader::read_incremental;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8080";

/// Where the relay lives and how to authenticate against it.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Full URL of the streaming completion route.
    pub fn stream_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            COMPLETION_STREAM_PATH
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_URL)
    }
}

/// HTTP client for the relay's streaming completion route.
pub struct RelayClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl RelayClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("relay URL is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Posts `request` and reads the flat text stream incrementally.
    ///
    /// `on_progress` sees the cumulative text after every received chunk and
    /// `on_finish` the final text once. A `204 No Content` answer carries no
    /// body: neither callback runs and `Ok(None)` is returned.
    pub async fn stream_completion(
        &self,
        request: &CompletionRequest,
        on_progress: impl FnMut(&str),
        on_finish: impl FnOnce(&str),
    ) -> Result<Option<String>, ClientError> {
        let mut builder = self.http.post(self.config.stream_url()).json(request);
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }

        debug!(model = %request.model, url = %self.config.stream_url(), "requesting completion stream");
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("relay request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(status = status.as_u16(), "relay rejected completion request");
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = (status != StatusCode::NO_CONTENT).then(|| response.bytes_stream());
        Ok(read_incremental(body, on_progress, on_finish).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_joins_without_double_slash() {
        let config = ClientConfig::new("http://relay.local:9000/");
        assert_eq!(
            config.stream_url(),
            "http://relay.local:9000/api/completions/stream"
        );
    }

    #[test]
    fn debug_redacts_access_token() {
        let config = ClientConfig::default().access_token("secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn empty_url_is_a_config_error() {
        let err = RelayClient::new(ClientConfig::new("  ")).err();
        assert!(matches!(err, Some(ClientError::Config(_))));
    }
}
