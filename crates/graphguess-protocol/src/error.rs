//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown event name, missing
    /// fields or wrong field types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but cannot be used (e.g. it is not UTF-8 text).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
