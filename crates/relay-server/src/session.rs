//! Reassembly of upstream network chunks into whole records.
//!
//! A single upstream event regularly spans two physical chunks. The
//! [`Reassembler`] keeps the unparsed bytes between reads and decides, per
//! combined chunk, which deltas may be forwarded.

use relay_core::wire::UPSTREAM_RECORD_DELIMITER;
use tracing::{debug, trace};

use crate::event::{decode_record, frame_record};

/// Lifecycle of one relay session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Streaming,
    Terminated,
    Failed,
}

/// Result of feeding one physical chunk to the [`Reassembler`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkOutcome {
    /// Every record decoded; forward these deltas in order.
    Forward(Vec<String>),
    /// Nothing was forwarded. Either a complete record failed to decode and
    /// the whole combined chunk is pending, or only a truncated tail arrived.
    Buffered { pending_len: usize },
    /// The sentinel was seen. Forward these deltas, then close the downstream.
    Terminated(Vec<String>),
    /// The pending buffer grew past the configured limit.
    Overflow { pending_len: usize },
    /// The session already left `Streaming`; the chunk was ignored.
    Closed,
}

/// Outcome of the upstream reporting end-of-input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpstreamEnd {
    /// Already terminated by the sentinel.
    AfterSentinel,
    /// The upstream closed without sending the sentinel.
    Premature { pending_len: usize },
}

/// Session-scoped reassembly state: the pending tail and the session state.
#[derive(Debug)]
pub struct Reassembler {
    pending: Vec<u8>,
    state: SessionState,
    pending_limit: Option<usize>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Reassembler {
    /// Creates a reassembler. `pending_limit` bounds re-buffering; `None`
    /// re-buffers without bound.
    pub fn new(pending_limit: Option<usize>) -> Self {
        Self {
            pending: Vec::new(),
            state: SessionState::Streaming,
            pending_limit,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes carried over from previous chunks.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Feeds the next physical chunk read from the upstream.
    ///
    /// Complete records (those followed by a delimiter) are walked in order up
    /// to the first sentinel. Their deltas are only committed when every one
    /// of them decodes; otherwise the whole combined chunk is kept for the next
    /// read and nothing from it is forwarded, so a delta can never be
    /// forwarded twice.
    ///
    /// The bytes after the last delimiter are a possibly truncated tail. They
    /// never hold back the complete records before them: a tail that decodes
    /// is consumed, any other tail becomes the pending buffer on its own.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> ChunkOutcome {
        if self.state != SessionState::Streaming {
            return ChunkOutcome::Closed;
        }

        let mut combined = std::mem::take(&mut self.pending);
        combined.extend_from_slice(chunk);

        let split = combined
            .iter()
            .rposition(|&b| b == UPSTREAM_RECORD_DELIMITER)
            .map_or(0, |at| at + 1);
        let (complete, tail) = combined.split_at(split);

        let mut deltas = Vec::new();
        let walked = walk_records(&String::from_utf8_lossy(complete), &mut deltas);
        match walked {
            Walk::Terminated => {
                self.state = SessionState::Terminated;
                return ChunkOutcome::Terminated(deltas);
            }
            Walk::DecodeFailed => return self.rebuffer(combined),
            Walk::Continue => {}
        }

        let walked = walk_records(&String::from_utf8_lossy(tail), &mut deltas);
        match walked {
            Walk::Terminated => {
                self.state = SessionState::Terminated;
                ChunkOutcome::Terminated(deltas)
            }
            Walk::Continue => ChunkOutcome::Forward(deltas),
            Walk::DecodeFailed if deltas.is_empty() => self.rebuffer(tail.to_vec()),
            Walk::DecodeFailed => {
                // The limit is enforced once a later chunk fails to complete the tail.
                trace!(pending_len = tail.len(), "holding truncated tail");
                self.pending = tail.to_vec();
                ChunkOutcome::Forward(deltas)
            }
        }
    }

    fn rebuffer(&mut self, pending: Vec<u8>) -> ChunkOutcome {
        let pending_len = pending.len();
        self.pending = pending;
        if let Some(limit) = self.pending_limit
            && pending_len > limit
        {
            self.state = SessionState::Failed;
            return ChunkOutcome::Overflow { pending_len };
        }
        debug!(pending_len, "re-buffered unparsed bytes");
        ChunkOutcome::Buffered { pending_len }
    }

    /// Records that the upstream reported end-of-input.
    pub fn finish_upstream(&mut self) -> UpstreamEnd {
        match self.state {
            SessionState::Terminated => UpstreamEnd::AfterSentinel,
            SessionState::Streaming | SessionState::Failed => {
                self.state = SessionState::Failed;
                UpstreamEnd::Premature {
                    pending_len: self.pending.len(),
                }
            }
        }
    }

    /// Marks the session failed (read error or downstream gone).
    pub fn fail(&mut self) {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Failed;
        }
    }
}

enum Walk {
    Continue,
    Terminated,
    DecodeFailed,
}

/// Decodes delimited records into `deltas`, stopping at the sentinel or the
/// first record that does not decode.
fn walk_records(text: &str, deltas: &mut Vec<String>) -> Walk {
    for raw in text.split(UPSTREAM_RECORD_DELIMITER as char) {
        let Some(content) = frame_record(raw) else {
            continue;
        };
        match decode_record(content) {
            Ok(event) if event.is_termination_sentinel => return Walk::Terminated,
            Ok(event) => deltas.extend(event.delta_text),
            Err(err) => {
                trace!(error = %err, record_len = content.len(), "record did not decode");
                return Walk::DecodeFailed;
            }
        }
    }
    Walk::Continue
}
