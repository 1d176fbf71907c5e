//! WebSocket close codes (RFC 6455 section 7.4.1) and how a close is
//! surfaced on a Mopidy message stream.

use serde_json::json;

use crate::error::MopidyError;
use crate::message::MopidyMessage;

/// Event name emitted for a normal closure
pub const WEBSOCKET_CLOSED: &str = "websocket_closed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    GoingAway,
    ProtocolError,
    UnsupportedData,
    Reserved,
    NoStatus,
    Abnormal,
    InvalidPayload,
    PolicyViolation,
    MessageTooBig,
    MandatoryExtension,
    InternalError,
    TlsHandshake,
    Unknown(u16),
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1004 => CloseCode::Reserved,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1015 => CloseCode::TlsHandshake,
            other => CloseCode::Unknown(other),
        }
    }
}

impl CloseCode {
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::Reserved => 1004,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Unknown(code) => *code,
        }
    }

    /// Human readable explanation. `reason` is the peer-supplied close reason,
    /// which for 1010 lists the missing extensions.
    pub fn describe(&self, reason: &str) -> String {
        match self {
            CloseCode::Normal => "Normal closure, meaning that the purpose for which the connection was established has been fulfilled.".to_string(),
            CloseCode::GoingAway => "An endpoint is \"going away\", such as a server going down or a browser having navigated away from a page.".to_string(),
            CloseCode::ProtocolError => "An endpoint is terminating the connection due to a protocol error".to_string(),
            CloseCode::UnsupportedData => "An endpoint is terminating the connection because it has received a type of data it cannot accept (e.g., an endpoint that understands only text data MAY send this if it receives a binary message).".to_string(),
            CloseCode::Reserved => "Reserved. The specific meaning might be defined in the future.".to_string(),
            CloseCode::NoStatus => "No status code was actually present.".to_string(),
            CloseCode::Abnormal => "The connection was closed abnormally, e.g., without sending or receiving a Close control frame".to_string(),
            CloseCode::InvalidPayload => "An endpoint is terminating the connection because it has received data within a message that was not consistent with the type of the message (e.g., non-UTF-8 data within a text message).".to_string(),
            CloseCode::PolicyViolation => "An endpoint is terminating the connection because it has received a message that \"violates its policy\". This reason is given either if there is no other suitable reason, or if there is a need to hide specific details about the policy.".to_string(),
            CloseCode::MessageTooBig => "An endpoint is terminating the connection because it has received a message that is too big for it to process.".to_string(),
            CloseCode::MandatoryExtension => format!(
                "An endpoint (client) is terminating the connection because it has expected the server to negotiate one or more extension, but the server didn't return them in the response message of the WebSocket handshake. Specifically, the extensions that are needed are: {}",
                reason
            ),
            CloseCode::InternalError => "A server is terminating the connection because it encountered an unexpected condition that prevented it from fulfilling the request.".to_string(),
            CloseCode::TlsHandshake => "The connection was closed due to a failure to perform a TLS handshake (e.g., the server certificate can't be verified).".to_string(),
            CloseCode::Unknown(_) => "The connection was closed for an unknown reason.".to_string(),
        }
    }
}

/// Turn a close into the last item of a message stream: codes up to 1000
/// become a `websocket_closed` event, anything above is an error.
pub fn classify_close(code: u16, reason: &str) -> Result<MopidyMessage, MopidyError> {
    let close = CloseCode::from(code);
    let description = close.describe(reason);
    if code > 1000 {
        Err(MopidyError::Closed {
            code,
            reason: description,
        })
    } else {
        Ok(MopidyMessage::Event {
            event: WEBSOCKET_CLOSED.to_string(),
            data: json!({ "code": code, "reason": reason, "description": description }),
        })
    }
}
