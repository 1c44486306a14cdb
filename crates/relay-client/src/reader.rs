//! Incremental consumption of the relay's flat text stream.

use futures::{Stream, StreamExt as _};
use tracing::{debug, warn};

/// Text received so far from one downstream stream.
///
/// Chunk boundaries may fall inside a multi-byte character; the incomplete
/// bytes are carried to the next chunk so the accumulated text only ever
/// grows by whole characters.
#[derive(Debug, Default)]
pub struct ClientAccumulator {
    text: String,
    carry: Vec<u8>,
    done: bool,
}

impl ClientAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full text decoded so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `true` once the end of the stream was observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Appends one received chunk and returns the cumulative text.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> &str {
        if self.done {
            warn!(chunk_len = chunk.len(), "chunk received after end of stream; ignored");
            return &self.text;
        }
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        let rest = decode_utf8_prefix(&bytes, &mut self.text);
        self.carry = rest.to_vec();
        &self.text
    }

    /// Marks the stream finished and returns the final text.
    pub fn finish(&mut self) -> &str {
        if !self.carry.is_empty() {
            warn!(
                dropped = self.carry.len(),
                "stream ended inside a multi-byte character"
            );
            self.carry.clear();
        }
        self.done = true;
        &self.text
    }
}

/// Decodes the longest UTF-8 prefix of `bytes` into `out`, replacing invalid
/// sequences with U+FFFD, and returns the trailing incomplete sequence.
fn decode_utf8_prefix<'a>(mut bytes: &'a [u8], out: &mut String) -> &'a [u8] {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                return &[];
            }
            Err(err) => {
                let (valid, after) = bytes.split_at(err.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    out.push_str(text);
                }
                match err.error_len() {
                    Some(invalid_len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &after[invalid_len..];
                    }
                    None => return after,
                }
            }
        }
    }
}

/// Consumes a downstream body until it ends.
///
/// `on_progress` runs with the cumulative text after every chunk that extends
/// it, so successive arguments are strictly growing prefixes. Empty chunks and
/// chunks holding only part of a multi-byte character fire nothing.
/// `on_finish` runs once at end-of-stream with the final text, which equals
/// the last progress argument. A read error is treated as end-of-stream.
/// When there is no body at all, neither callback runs and `None` is returned.
pub async fn read_incremental<S, B, E>(
    body: Option<S>,
    mut on_progress: impl FnMut(&str),
    on_finish: impl FnOnce(&str),
) -> Option<String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let Some(body) = body else {
        debug!("response carried no body; nothing to read");
        return None;
    };
    futures::pin_mut!(body);

    let mut accumulator = ClientAccumulator::new();
    let mut chunks = 0_u64;
    while let Some(next) = body.next().await {
        match next {
            Ok(chunk) => {
                chunks += 1;
                let before = accumulator.text().len();
                let text = accumulator.push_chunk(chunk.as_ref());
                if text.len() > before {
                    on_progress(text);
                }
            }
            Err(err) => {
                warn!(error = %err, chunks, "downstream read failed; treating as end of stream");
                break;
            }
        }
    }

    let text = accumulator.finish();
    debug!(chunks, chars = text.chars().count(), "downstream stream finished");
    on_finish(text);
    Some(text.to_owned())
}
