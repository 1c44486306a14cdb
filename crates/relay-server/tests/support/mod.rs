#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream;
use relay_core::CompletionRequest;
use relay_server::upstream::BoxError;
use relay_server::{
    AllowAnonymous, AppState, Authorizer, BearerTokenAuthorizer, ByteStream, SessionOptions,
    Upstream, UpstreamError,
};

pub const TOKEN: &str = "test-token";

pub fn delta_record(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices":[{"index":0,"delta":{"content":text}}]})
    )
}

pub const DONE: &str = "data: [DONE]\n\n";

/// Upstream that replays fixed chunks, or fails to open, and records every
/// request it was asked to open.
#[derive(Clone)]
pub struct ScriptedUpstream {
    script: Result<Vec<String>, UpstreamError>,
    pub opened: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedUpstream {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Ok(chunks.into_iter().map(Into::into).collect()),
            opened: Arc::default(),
        }
    }

    pub fn failing(err: UpstreamError) -> Self {
        Self {
            script: Err(err),
            opened: Arc::default(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().map(|opened| opened.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Upstream for ScriptedUpstream {
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream, UpstreamError> {
        self.opened
            .lock()
            .expect("opened lock")
            .push(request.clone());
        let chunks = self.script.clone()?;
        let items: Vec<Result<Bytes, BoxError>> =
            chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn state_with(upstream: ScriptedUpstream, authorizer: Arc<dyn Authorizer>) -> AppState {
    AppState::new(Arc::new(upstream), authorizer, SessionOptions::default())
}

pub fn bearer_state(upstream: ScriptedUpstream) -> AppState {
    state_with(upstream, Arc::new(BearerTokenAuthorizer::new(TOKEN)))
}

pub fn anonymous_state(upstream: ScriptedUpstream) -> AppState {
    state_with(upstream, Arc::new(AllowAnonymous))
}

pub fn hello_world_upstream() -> ScriptedUpstream {
    ScriptedUpstream::chunks([
        delta_record("Hello"),
        delta_record(" world"),
        DONE.to_string(),
    ])
}
