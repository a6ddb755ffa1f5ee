//! Unified error type for Roomward.

use roomward_protocol::{Identity, ProtocolError, Role};
use roomward_room::RoomError;
use roomward_transport::TransportError;

use crate::GatewayError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant generates the `From`
/// impls, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomwardError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (refusal, unknown room, actor gone).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A client-side gateway error.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The identity is already connected in this role.
    #[error("{role} {identity} is already connected")]
    DuplicateIdentity { role: Role, identity: Identity },

    /// Bad server or room configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let roomward_err: RoomwardError = err.into();
        assert!(matches!(roomward_err, RoomwardError::Transport(_)));
        assert!(roomward_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let roomward_err: RoomwardError = err.into();
        assert!(matches!(roomward_err, RoomwardError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::RoomNotFound(roomward_protocol::RoomId(1));
        let roomward_err: RoomwardError = err.into();
        assert!(matches!(roomward_err, RoomwardError::Room(_)));
    }

    #[test]
    fn test_from_gateway_error() {
        let err = GatewayError::TransportUnavailable("refused".into());
        let roomward_err: RoomwardError = err.into();
        assert!(matches!(roomward_err, RoomwardError::Gateway(_)));
    }

    #[test]
    fn test_duplicate_identity_message() {
        let err = RoomwardError::DuplicateIdentity {
            role: Role::Cleaner,
            identity: Identity(7),
        };
        assert_eq!(err.to_string(), "cleaner #7 is already connected");
    }
}
