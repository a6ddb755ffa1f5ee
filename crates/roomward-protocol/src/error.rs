//! Error types for the protocol layer.

/// Errors raised while turning envelopes into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were malformed, truncated, or of the wrong shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks protocol rules, e.g. a call sent
    /// before the handshake or a handshake with the wrong version.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
