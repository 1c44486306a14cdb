/// Failures raised before the downstream stream starts.
///
/// Problems after the first byte never surface here; the reader treats them
/// as end-of-stream and hands back whatever text arrived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("client configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// The relay answered with a non-success status.
    #[error("relay rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Rejected { status: 401, .. })
    }
}
