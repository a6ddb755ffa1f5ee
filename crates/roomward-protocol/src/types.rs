//! Core protocol types for Roomward's wire format.
//!
//! Everything in this module travels between a remote actor (applicant,
//! approver, maintainer, cleaner) and the process hosting the rooms. The
//! room layer reuses the identity types directly so the same `Identity`
//! flows from the socket all the way into a room's applicant pool.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable numeric identity of a remote actor.
///
/// Identities are issued outside Roomward and supplied by the caller. The
/// same number may be used by different roles; uniqueness is only enforced
/// per role (see the lobby `Check` request).
///
/// `#[serde(transparent)]` keeps it a plain number on the wire: `42`,
/// not `{"0":42}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one room coordinator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl RoomId {
    /// The bootstrap room every server hosts. Its registries double as the
    /// identity-uniqueness record for connected actors.
    pub const LOBBY: RoomId = RoomId(0);

    pub fn is_lobby(self) -> bool {
        self == Self::LOBBY
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// The four kinds of remote actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Seeks to occupy a room.
    Applicant,
    /// Grants or denies occupancy.
    Approver,
    /// Reports and fixes faults.
    Maintainer,
    /// Resets hygiene state.
    Cleaner,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Applicant,
        Role::Approver,
        Role::Maintainer,
        Role::Cleaner,
    ];

    /// Lowercase label used in logs and messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Approver => "approver",
            Self::Maintainer => "maintainer",
            Self::Cleaner => "cleaner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Room calls
// ---------------------------------------------------------------------------

/// One remote-callable operation on a room.
///
/// The caller's notification handle is not part of the request; the server
/// attaches the connection's own handle when it forwards the call.
///
/// Internally tagged: `{"op": "Apply", "identity": 1, "headcount": 4}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum RoomRequest {
    /// An applicant asks for the room for a party of `headcount`.
    Apply { identity: Identity, headcount: u32 },
    /// An approver approves `identity`'s application.
    Approve { identity: Identity },
    /// An approver rejects `identity`'s application or reservation.
    Reject { identity: Identity },
    /// The current occupant is done with the room.
    EndUse { identity: Identity },
    /// Somebody on site reports a fault.
    ReportFault { identity: Identity, role: Role },
    /// A cleaner finished cleaning.
    CleanComplete { identity: Identity },
    /// A maintainer finished a repair.
    RepairComplete { identity: Identity },
    /// An applicant withdraws.
    Cancel { identity: Identity },
    /// Subscribe to the room's notifications for `role`.
    Register { role: Role, identity: Identity },
    /// Unsubscribe from the room's notifications for `role`.
    Disconnect { role: Role, identity: Identity },
    /// Is `identity` registered for `role` in this room?
    Check { role: Role, identity: Identity },
    /// An applicant goes offline without withdrawing.
    GoOffline { identity: Identity },
    /// An offline applicant comes back and fetches its notifications.
    Reattach { identity: Identity },
    /// Snapshot of the room.
    Status,
}

impl RoomRequest {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Apply { .. } => "apply",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::EndUse { .. } => "end_use",
            Self::ReportFault { .. } => "report_fault",
            Self::CleanComplete { .. } => "clean_complete",
            Self::RepairComplete { .. } => "repair_complete",
            Self::Cancel { .. } => "cancel",
            Self::Register { .. } => "register",
            Self::Disconnect { .. } => "disconnect",
            Self::Check { .. } => "check",
            Self::GoOffline { .. } => "go_offline",
            Self::Reattach { .. } => "reattach",
            Self::Status => "status",
        }
    }

    /// The identity the request is about, if any.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Apply { identity, .. }
            | Self::Approve { identity }
            | Self::Reject { identity }
            | Self::EndUse { identity }
            | Self::ReportFault { identity, .. }
            | Self::CleanComplete { identity }
            | Self::RepairComplete { identity }
            | Self::Cancel { identity }
            | Self::Register { identity, .. }
            | Self::Disconnect { identity, .. }
            | Self::Check { identity, .. }
            | Self::GoOffline { identity }
            | Self::Reattach { identity } => Some(*identity),
            Self::Status => None,
        }
    }
}

/// Why a room refused a call. Mirrors the room layer's domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    IllegalTransition,
    AlreadyApplied,
    CapacityExceeded,
    NotFound,
    NotCurrentOccupant,
    InvalidState,
}

/// A point-in-time view of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub name: String,
    /// Condition label, e.g. `"CLEAN_EMPTY"`.
    pub condition: String,
    pub capacity: u32,
    pub occupant: Option<Identity>,
    pub reserved: Option<Identity>,
    /// Number of applicant records, occupant included.
    pub applicants: usize,
    /// Number of registered subscribers across all roles.
    pub subscribers: usize,
}

/// The outcome of a room call.
///
/// A domain refusal is a normal reply (`Rejected`), not a transport error:
/// the call reached the room and the room said no.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Reply {
    /// The operation committed.
    Done,
    /// Registration committed; `already_present` is true when the identity
    /// was registered before and only its handle was replaced.
    Registered { already_present: bool },
    /// Answer to `Check`.
    Checked { present: bool },
    /// Answer to `Status`.
    Status(RoomStatus),
    /// The room refused the call and nothing changed.
    Rejected {
        reason: RejectReason,
        message: String,
    },
}

impl Reply {
    /// Returns `true` unless the room refused the call.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

// ---------------------------------------------------------------------------
// Session-level messages
// ---------------------------------------------------------------------------

/// Connection plumbing, independent of any room.
///
/// Internally tagged: `{"type": "Heartbeat", "client_time": 5000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first message on every connection.
    Handshake {
        version: u32,
        role: Role,
        identity: Identity,
    },

    /// Server → Client: the identity is registered for the role.
    HandshakeAck { identity: Identity, role: Role },

    /// Either direction: "I'm going away."
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive answer.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client: something went wrong outside any room's domain
    /// rules. `code` follows HTTP conventions (400, 404, 409, 503).
    Error { code: u16, message: String },
}

/// What an envelope carries.
///
/// Adjacently tagged: `{"type": "Notify", "data": {"message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection plumbing.
    System(SystemMessage),

    /// Client → Server: invoke `request` on `room_id`.
    Call {
        room_id: RoomId,
        request: RoomRequest,
    },

    /// Server → Client: the answer to the call with the same `seq`.
    Reply(Reply),

    /// Server → Client: a pushed notification (the callback's `update`).
    Notify { message: String },
}

/// The top-level message wrapper. Every frame on the wire is one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Caller-chosen correlation number. Replies and call-scoped errors
    /// echo the `seq` of the call; pushed notifications carry 0.
    pub seq: u64,

    pub payload: Payload,
}

impl Envelope {
    pub fn new(seq: u64, payload: Payload) -> Self {
        Self { seq, payload }
    }

    pub fn system(seq: u64, msg: SystemMessage) -> Self {
        Self::new(seq, Payload::System(msg))
    }

    pub fn error(seq: u64, code: u16, message: impl Into<String>) -> Self {
        Self::system(
            seq,
            SystemMessage::Error {
                code,
                message: message.into(),
            },
        )
    }
}
