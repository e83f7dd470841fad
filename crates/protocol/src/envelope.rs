use crate::ProtocolError;
use crate::messages::{ClientMessage, ServerMessage};

/// Decodes a text frame into a [`ClientMessage`].
///
/// Parsing happens in two steps so callers can tell "not JSON" apart from
/// "JSON of the wrong shape".
pub fn decode_control(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    serde_json::from_value(value).map_err(ProtocolError::InvalidMessage)
}

/// Encodes a reply as a JSON string.
pub fn encode_reply(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}
