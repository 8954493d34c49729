use super::envelope::ServerEnvelope;

/// Maximum size of a peer-originated relay frame, in bytes. Frames larger
/// than this are rejected as `bad_request` rather than silently truncated.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "failed to encode server envelope: {e}"),
            Self::Decode(e) => write!(f, "failed to decode server envelope: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a hub-originated envelope as a UTF-8 JSON text frame.
pub fn encode_server_envelope(env: &ServerEnvelope) -> Result<String, ProtocolError> {
    serde_json::to_string(env).map_err(ProtocolError::Encode)
}

/// Decode a hub-originated envelope from a UTF-8 JSON text frame. Used by
/// tests and by any forward-compatible consumer of the wire format; the hub
/// itself never needs to decode its own output.
pub fn decode_server_envelope(data: &str) -> Result<ServerEnvelope, ProtocolError> {
    serde_json::from_str(data).map_err(ProtocolError::Decode)
}
