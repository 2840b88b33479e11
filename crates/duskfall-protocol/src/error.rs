//! Error types for the protocol layer.
//!
//! Each Duskfall crate defines its own error enum, so a `ProtocolError`
//! always means serialization trouble, never a game rule.

/// Errors that can occur while encoding or decoding notices.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields, or a
    /// notice type this build does not know.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The input decoded but is not a valid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
