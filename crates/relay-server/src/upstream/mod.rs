//! Upstream completion provider seam.
//!
//! The relay talks to exactly one provider; the trait exists so the session
//! loop and routes can be exercised against in-process fakes.
mod config;
mod openai;

use std::pin::Pin;

use relay_core::CompletionRequest;

pub use config::OpenAiConfig;
pub use openai::OpenAiUpstream;

/// Error type carried by upstream body reads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Raw upstream body, one item per physical chunk.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, BoxError>> + Send + 'static>>;

/// Failures that abort a session before any downstream byte is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The connection could not be established or the request not sent.
    #[error("upstream transport error: {message}")]
    Transport { message: String },
    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl UpstreamError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}

/// Opens one streamed completion against the provider.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Issues the request with streaming enabled and returns the open body.
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream, UpstreamError>;
}
