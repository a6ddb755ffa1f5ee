//! Error types for the room layer.

use roomward_protocol::{Identity, RejectReason, RoomId};

use crate::IllegalTransition;

/// Errors that can occur during room operations.
///
/// Every variant except [`RoomNotFound`](RoomError::RoomNotFound) and
/// [`Unavailable`](RoomError::Unavailable) is a domain rejection: the room
/// looked at the request, refused it, and changed nothing.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The state machine refused the event.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// The identity already has an application in this room.
    #[error("applicant {0} has already applied")]
    AlreadyApplied(Identity),

    /// The party does not fit in the room.
    #[error("party of {headcount} exceeds capacity {capacity}")]
    CapacityExceeded { headcount: u32, capacity: u32 },

    /// The identity has no application (or reservation) here.
    #[error("applicant {0} not found")]
    NotFound(Identity),

    /// Only the current occupant may end the room's use.
    #[error("applicant {0} is not the current occupant")]
    NotCurrentOccupant(Identity),

    /// The request is well-formed but makes no sense right now.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// No room with this ID is hosted here.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room's actor is gone (shut down or its channel closed).
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The wire reason for a domain rejection, or `None` if the error is
    /// about reaching the room rather than the room refusing.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::IllegalTransition(_) => Some(RejectReason::IllegalTransition),
            Self::AlreadyApplied(_) => Some(RejectReason::AlreadyApplied),
            Self::CapacityExceeded { .. } => Some(RejectReason::CapacityExceeded),
            Self::NotFound(_) => Some(RejectReason::NotFound),
            Self::NotCurrentOccupant(_) => Some(RejectReason::NotCurrentOccupant),
            Self::InvalidState(_) => Some(RejectReason::InvalidState),
            Self::RoomNotFound(_) | Self::Unavailable(_) => None,
        }
    }

    /// Returns `true` for domain rejections.
    pub fn is_rejection(&self) -> bool {
        self.reject_reason().is_some()
    }
}
