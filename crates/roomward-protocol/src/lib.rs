//! Wire protocol for Roomward.
//!
//! - **Types** ([`Envelope`], [`RoomRequest`], [`Reply`], [`Identity`], ...)
//!   describe what remote actors and the room server say to each other.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turns them into bytes.
//! - **Errors** ([`ProtocolError`]) cover encoding and protocol violations.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (RoomRequest / Reply)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, Identity, Payload, RejectReason, Reply, Role, RoomId,
    RoomRequest, RoomStatus, SystemMessage,
};

/// Protocol version both ends must agree on during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;
