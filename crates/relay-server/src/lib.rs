//! Streaming completion relay.
//!
//! One inbound request opens one upstream event stream. Upstream chunks are
//! reassembled into records, text deltas are extracted, and the deltas are
//! written to the client as a flat `text/plain` byte stream.
//!
//! ```no_run
//! use relay_server::{AppState, RelayConfig, router};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::from_env()?;
//! let app = router(AppState::from_config(&config)?);
//! let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Authorization seam for inbound requests.
pub mod auth;
/// Environment configuration.
pub mod config;
/// Synchronous (pre-stream) error responses.
pub mod errors;
/// Framing and decoding of single upstream records.
pub mod event;
/// Per-request session task connecting upstream and downstream.
pub mod relay;
/// HTTP routes.
pub mod routes;
/// Chunk reassembly and session state.
pub mod session;
/// Shared handler state.
pub mod state;
/// Upstream provider adapter.
pub mod upstream;

pub use auth::{AllowAnonymous, Authorizer, BearerTokenAuthorizer};
pub use config::{AccessPolicy, ConfigError, RelayConfig, SessionOptions};
pub use errors::RelayError;
pub use event::UpstreamEvent;
pub use relay::{DownstreamBody, SessionReport, StreamSession, spawn_session};
pub use routes::router;
pub use session::{ChunkOutcome, Reassembler, SessionState, UpstreamEnd};
pub use state::AppState;
pub use upstream::{ByteStream, OpenAiConfig, OpenAiUpstream, Upstream, UpstreamError};
