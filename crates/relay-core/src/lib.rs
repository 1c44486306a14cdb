//! Shared building blocks for the streaming completion relay.
//!
//! The relay server and the incremental client both depend on this crate for
//! the inbound request schema and the downstream wire contract.

/// Process-wide tracing initialisation.
pub mod observability;
/// Inbound completion request schema and validation.
pub mod request;
/// Wire-level constants shared by the server and the client.
pub mod wire;

pub use observability::{LogOutput, ObservabilitySettings, init_observability};
pub use request::{ChatMessage, CompletionRequest, ModelId, Role, ValidationError};
