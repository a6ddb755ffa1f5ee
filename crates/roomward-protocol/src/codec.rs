//! Codec trait and implementations for serializing envelopes.
//!
//! The server and the gateway client never call `serde_json` directly; they
//! go through a [`Codec`] so a binary format can replace JSON without
//! touching either side.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable frames make it easy to drive a room from a browser
/// console or `websocat` while developing.
///
/// ## Example
///
/// ```rust
/// use roomward_protocol::{Codec, Envelope, Identity, JsonCodec, Payload, RoomId, RoomRequest};
///
/// let codec = JsonCodec;
/// let call = Envelope::new(
///     1,
///     Payload::Call {
///         room_id: RoomId(1),
///         request: RoomRequest::Approve { identity: Identity(4) },
///     },
/// );
///
/// let bytes = codec.encode(&call).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(call, decoded);
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
    use crate::{Envelope, Identity, Payload, Role, SystemMessage};

    #[test]
    fn test_json_codec_handshake_survives_the_wire() {
        let codec = JsonCodec;
        let env = Envelope::system(
            0,
            SystemMessage::Handshake {
                version: crate::PROTOCOL_VERSION,
                role: Role::Cleaner,
                identity: Identity(8),
            },
        );

        let bytes = codec.encode(&env).expect("encode");
        let decoded: Envelope = codec.decode(&bytes).expect("decode");

        assert_eq!(decoded, env);
    }

    #[test]
    fn test_json_codec_notify_is_readable_json() {
        let codec = JsonCodec;
        let env = Envelope::new(
            0,
            Payload::Notify {
                message: "R-1 is OCCUPIED".into(),
            },
        );

        let bytes = codec.encode(&env).expect("encode");
        let text = std::str::from_utf8(&bytes).expect("utf8");

        assert!(text.contains("\"Notify\""));
        assert!(text.contains("R-1 is OCCUPIED"));
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let codec = JsonCodec;
        let result: Result<Envelope, _> = codec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
