use serde_json::Value;

use crate::error::MopidyError;

/// One inbound frame, classified
#[derive(Clone, Debug, PartialEq)]
pub enum MopidyMessage {
    /// Unsolicited core event; `data` is the whole payload
    Event { event: String, data: Value },
    /// Reply to a request. Carries no usable id, see [`crate::Request`].
    Response { result: Value },
}

impl MopidyMessage {
    /// Classify a text frame. A payload with an `error` member becomes
    /// [`MopidyError::Remote`].
    pub fn parse(text: &str) -> Result<Self, MopidyError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, MopidyError> {
        if !value.is_object() {
            return Err(MopidyError::Protocol(format!(
                "expected a JSON object, got {}",
                value
            )));
        }
        if value.get("error").is_some() {
            return Err(MopidyError::Remote(value));
        }
        if let Some(event) = value.get("event").and_then(Value::as_str) {
            return Ok(MopidyMessage::Event {
                event: event.to_string(),
                data: value,
            });
        }
        let result = value.get("result").cloned().unwrap_or(Value::Null);
        Ok(MopidyMessage::Response { result })
    }

    pub fn is_response(&self) -> bool {
        matches!(self, MopidyMessage::Response { .. })
    }

    pub fn event_name(&self) -> Option<&str> {
        match self {
            MopidyMessage::Event { event, .. } => Some(event),
            MopidyMessage::Response { .. } => None,
        }
    }
}
