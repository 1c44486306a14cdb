use std::net::SocketAddr;

use relay_core::observability::parse_bool_env;

use crate::upstream::OpenAiConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DOWNSTREAM_BUFFER: usize = 128;

/// Configuration errors raised while starting the relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {key}")]
    Missing { key: &'static str },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("client error: {0}")]
    Client(String),
}

impl ConfigError {
    pub fn missing(key: &'static str) -> Self {
        Self::Missing { key }
    }

    pub fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
        }
    }
}

/// Per-session knobs of the relay loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bounded buffer between the session task and the response body.
    pub downstream_buffer: usize,
    /// Upper bound for re-buffered bytes. `None` re-buffers without bound.
    pub pending_limit: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            downstream_buffer: DEFAULT_DOWNSTREAM_BUFFER,
            pending_limit: None,
        }
    }
}

/// How inbound requests are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    BearerToken(String),
    Anonymous,
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessPolicy::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            AccessPolicy::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Full relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub upstream: OpenAiConfig,
    pub access: AccessPolicy,
    pub session: SessionOptions,
}

impl RelayConfig {
    /// Loads the configuration from the process environment.
    ///
    /// Environment variables:
    /// - `RELAY_BIND_ADDR`: listen address (default `127.0.0.1:8080`).
    /// - `RELAY_ACCESS_TOKEN`: bearer token clients must present.
    /// - `RELAY_ALLOW_ANONYMOUS`: accept every request when no token is set.
    /// - `RELAY_DOWNSTREAM_BUFFER`: session channel capacity (default 128).
    /// - `RELAY_PENDING_LIMIT_BYTES`: optional re-buffering bound.
    /// - see [`OpenAiConfig::from_env`] for the upstream settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_raw =
            std::env::var("RELAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::invalid("RELAY_BIND_ADDR", bind_raw.clone()))?;

        let token = std::env::var("RELAY_ACCESS_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let allow_anonymous = match std::env::var("RELAY_ALLOW_ANONYMOUS") {
            Ok(raw) => parse_bool_env(&raw)
                .ok_or_else(|| ConfigError::invalid("RELAY_ALLOW_ANONYMOUS", raw.clone()))?,
            Err(_) => false,
        };
        let access = resolve_access(token, allow_anonymous)?;

        let mut session = SessionOptions::default();
        if let Some(capacity) = parse_usize_env("RELAY_DOWNSTREAM_BUFFER")? {
            if capacity == 0 {
                return Err(ConfigError::invalid("RELAY_DOWNSTREAM_BUFFER", "0"));
            }
            session.downstream_buffer = capacity;
        }
        session.pending_limit = parse_usize_env("RELAY_PENDING_LIMIT_BYTES")?;

        Ok(Self {
            bind_addr,
            upstream: OpenAiConfig::from_env()?,
            access,
            session,
        })
    }
}

fn resolve_access(
    token: Option<String>,
    allow_anonymous: bool,
) -> Result<AccessPolicy, ConfigError> {
    match (token, allow_anonymous) {
        (Some(token), _) => Ok(AccessPolicy::BearerToken(token)),
        (None, true) => Ok(AccessPolicy::Anonymous),
        (None, false) => Err(ConfigError::missing("RELAY_ACCESS_TOKEN")),
    }
}

fn parse_usize_env(key: &'static str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, raw.clone())),
        Err(_) => Ok(None),
    }
}
