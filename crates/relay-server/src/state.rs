use std::sync::Arc;

use crate::auth::Authorizer;
use crate::config::{ConfigError, RelayConfig, SessionOptions};
use crate::upstream::{OpenAiUpstream, Upstream};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
    pub authorizer: Arc<dyn Authorizer>,
    pub session: SessionOptions,
}

impl AppState {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        authorizer: Arc<dyn Authorizer>,
        session: SessionOptions,
    ) -> Self {
        Self {
            upstream,
            authorizer,
            session,
        }
    }

    /// Builds the production state: OpenAI upstream plus the configured access policy.
    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        let upstream = OpenAiUpstream::new(config.upstream.clone())?;
        Ok(Self::new(
            Arc::new(upstream),
            (&config.access).into(),
            config.session.clone(),
        ))
    }
}
