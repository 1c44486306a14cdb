use std::fmt;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation sent to the model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Models the relay is allowed to request from the upstream.
///
/// Unknown identifiers fail deserialization, so an unsupported model never
/// reaches the upstream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl ModelId {
    /// Every supported model, in declaration order.
    pub const ALL: [ModelId; 5] = [
        ModelId::Gpt35Turbo,
        ModelId::Gpt4,
        ModelId::Gpt4Turbo,
        ModelId::Gpt4o,
        ModelId::Gpt4oMini,
    ];

    /// Returns the upstream model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt35Turbo => "gpt-3.5-turbo",
            ModelId::Gpt4 => "gpt-4",
            ModelId::Gpt4Turbo => "gpt-4-turbo",
            ModelId::Gpt4o => "gpt-4o",
            ModelId::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|model| model.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnsupportedModel(s.to_string()))
    }
}

/// Inbound request for one streamed completion.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: ModelId,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;
pub const PENALTY_RANGE: std::ops::RangeInclusive<f64> = -2.0..=2.0;

impl CompletionRequest {
    /// Creates a request with no optional sampling parameters.
    pub fn new(model: ModelId, messages: Vec<ChatMessage>, temperature: f64) -> Self {
        Self {
            messages,
            model,
            temperature,
            presence_penalty: None,
            frequency_penalty: None,
            max_tokens: None,
        }
    }

    pub fn presence_penalty(mut self, value: f64) -> Self {
        self.presence_penalty = Some(value);
        self
    }

    pub fn frequency_penalty(mut self, value: f64) -> Self {
        self.frequency_penalty = Some(value);
        self
    }

    pub fn max_tokens(mut self, value: u32) -> Self {
        self.max_tokens = Some(value);
        self
    }

    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::NoMessages);
        }
        check_range("temperature", self.temperature, &TEMPERATURE_RANGE)?;
        if let Some(value) = self.presence_penalty {
            check_range("presence_penalty", value, &PENALTY_RANGE)?;
        }
        if let Some(value) = self.frequency_penalty {
            check_range("frequency_penalty", value, &PENALTY_RANGE)?;
        }
        if self.max_tokens == Some(0) {
            return Err(ValidationError::ZeroMaxTokens);
        }
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    range: &std::ops::RangeInclusive<f64>,
) -> Result<(), ValidationError> {
    if value.is_finite() && range.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::OutOfRange {
        field,
        value,
        min: *range.start(),
        max: *range.end(),
    })
}

/// Reasons a deserialized request is still rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one message is required")]
    NoMessages,
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("max_tokens must be greater than 0")]
    ZeroMaxTokens,
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CompletionRequest {
        CompletionRequest::new(
            ModelId::Gpt4oMini,
            vec![
                ChatMessage::system("You grade essays."),
                ChatMessage::user("Give feedback."),
            ],
            0.7,
        )
    }

    #[test]
    fn accepts_request_at_range_bounds() {
        let req = CompletionRequest {
            temperature: 2.0,
            ..valid()
        }
        .presence_penalty(-2.0)
        .frequency_penalty(2.0)
        .max_tokens(1);
        assert_eq!(req.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_messages() {
        let req = CompletionRequest {
            messages: Vec::new(),
            ..valid()
        };
        assert_eq!(req.validate(), Err(ValidationError::NoMessages));
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_values() {
        let hot = CompletionRequest {
            temperature: 2.1,
            ..valid()
        };
        assert!(matches!(
            hot.validate(),
            Err(ValidationError::OutOfRange { field: "temperature", .. })
        ));

        let nan = valid().presence_penalty(f64::NAN);
        assert!(matches!(
            nan.validate(),
            Err(ValidationError::OutOfRange { field: "presence_penalty", .. })
        ));

        let low = valid().frequency_penalty(-2.5);
        assert!(matches!(
            low.validate(),
            Err(ValidationError::OutOfRange { field: "frequency_penalty", .. })
        ));

        assert_eq!(
            valid().max_tokens(0).validate(),
            Err(ValidationError::ZeroMaxTokens)
        );
    }

    #[test]
    fn deserializes_wire_shape() {
        let req: CompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "gpt-4o",
            "temperature": 1,
            "max_tokens": 64
        }))
        .expect("valid payload");
        assert_eq!(req.model, ModelId::Gpt4o);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.max_tokens, Some(64));
        assert_eq!(req.presence_penalty, None);
    }

    #[test]
    fn unknown_model_or_role_fails_deserialization() {
        let bad_model = serde_json::from_value::<CompletionRequest>(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "davinci",
            "temperature": 0.5
        }));
        assert!(bad_model.is_err());

        let bad_role = serde_json::from_value::<CompletionRequest>(serde_json::json!({
            "messages": [{"role": "tool", "content": "hi"}],
            "model": "gpt-4",
            "temperature": 0.5
        }));
        assert!(bad_role.is_err());
    }

    #[test]
    fn model_id_round_trips_through_str() {
        for model in ModelId::ALL {
            assert_eq!(model.as_str().parse::<ModelId>(), Ok(model));
        }
        assert!(matches!(
            "gpt-5".parse::<ModelId>(),
            Err(ValidationError::UnsupportedModel(_))
        ));
    }
}
