/// Route served by the relay for streamed completions.
pub const COMPLETION_STREAM_PATH: &str = "/api/completions/stream";

/// Liveness route.
pub const HEALTH_PATH: &str = "/healthz";

/// Content type of the downstream body: raw concatenated deltas, no framing.
pub const DOWNSTREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Framing prefix of payload-bearing upstream records.
pub const UPSTREAM_DATA_PREFIX: &str = "data: ";

/// Upstream record content that marks the end of the event stream.
pub const UPSTREAM_TERMINATION_SENTINEL: &str = "[DONE]";

/// Record delimiter of the upstream line-oriented event stream.
pub const UPSTREAM_RECORD_DELIMITER: u8 = b'\n';
