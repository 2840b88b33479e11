//! Codec trait and implementations for handing notices to the chat bridge.
//!
//! The engine does not care how a bridge wants its bytes. Anything that
//! implements [`Codec`] can be plugged in; [`JsonCodec`] is the default and
//! the easiest to inspect in logs.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a codec is shared by every game actor
/// for the lifetime of the process.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use duskfall_protocol::{Codec, JsonCodec, Notice, PlayerId, Role};
///
/// let codec = JsonCodec;
/// let notice = Notice::Vision { target: PlayerId(4), role: Role::Seer };
///
/// let bytes = codec.encode(&notice).unwrap();
/// let decoded: Notice = codec.decode(&bytes).unwrap();
/// assert_eq!(notice, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{DeathCause, DeathReport, Notice, PlayerId, Role};

    #[test]
    fn test_decode_rejects_unknown_notice_type() {
        let err = JsonCodec
            .decode::<Notice>(br#"{"type":"Fireworks"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(err.to_string().starts_with("decode failed"));
    }

    #[test]
    fn test_dawn_notice_survives_the_codec() {
        let notice = Notice::Dawn {
            day: 2,
            deaths: vec![DeathReport {
                player: PlayerId(5),
                role: Role::Seer,
                cause: DeathCause::WolfKill,
            }],
            seconds: Some(300),
        };
        let bytes = JsonCodec.encode(&notice).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"wolf_kill\""));
        assert_eq!(JsonCodec.decode::<Notice>(&bytes).unwrap(), notice);
    }
}
