use relay_core::wire::{UPSTREAM_DATA_PREFIX, UPSTREAM_TERMINATION_SENTINEL};

/// One upstream record after framing has been removed and its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpstreamEvent {
    /// The record was the termination sentinel; nothing follows it.
    pub is_termination_sentinel: bool,
    /// Incremental text carried by the record, when it has one.
    pub delta_text: Option<String>,
}

impl UpstreamEvent {
    pub fn termination() -> Self {
        Self {
            is_termination_sentinel: true,
            delta_text: None,
        }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            is_termination_sentinel: false,
            delta_text: Some(text.into()),
        }
    }
}

/// Removes line framing from one raw record.
///
/// Returns `None` for blank records, which separate events and carry nothing.
pub fn frame_record(raw: &str) -> Option<&str> {
    let line = raw.trim();
    let content = line
        .strip_prefix(UPSTREAM_DATA_PREFIX.trim_end())
        .map(str::trim_start)
        .unwrap_or(line);
    (!content.is_empty()).then_some(content)
}

/// Decodes the framed content of one record.
///
/// An `Err` means the content is not JSON. Callers attribute that to a chunk
/// boundary falling inside the record.
pub fn decode_record(content: &str) -> Result<UpstreamEvent, serde_json::Error> {
    if content == UPSTREAM_TERMINATION_SENTINEL {
        return Ok(UpstreamEvent::termination());
    }
    let value: serde_json::Value = serde_json::from_str(content)?;
    Ok(UpstreamEvent {
        is_termination_sentinel: false,
        delta_text: extract_delta_text(&value),
    })
}

/// Reads `choices[0].delta.content` when it is a string.
pub(crate) fn extract_delta_text(value: &serde_json::Value) -> Option<String> {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .map(ToOwned::to_owned)
}
