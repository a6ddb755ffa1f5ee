//! The room condition state machine.
//!
//! Pure data: no identities, no I/O. The coordinator asks it whether an
//! event is legal and it answers with the next condition or an
//! [`IllegalTransition`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Condition axes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hygiene {
    Clean,
    NeedsCleaning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupancy {
    Empty,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repair {
    Normal,
    NeedsRepair,
}

// ---------------------------------------------------------------------------
// RoomCondition
// ---------------------------------------------------------------------------

/// The physical condition of a room.
///
/// Exactly one condition holds at a time:
///
/// ```text
///              Occupy             EndUse
/// CleanEmpty ─────────→ Occupied ────────→ NeedsCleaning
///     ↑                                        │
///     └──────────────── Clean ─────────────────┘
///
/// any of the above ──ReportFault──→ NeedsRepair ──Repair──→ NeedsCleaning
/// ```
///
/// `NeedsRepair` pre-empts everything and is left only through `Repair`.
/// A repaired room always goes back through cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCondition {
    CleanEmpty,
    Occupied,
    NeedsCleaning,
    NeedsRepair,
}

impl RoomCondition {
    pub const ALL: [RoomCondition; 4] = [
        Self::CleanEmpty,
        Self::Occupied,
        Self::NeedsCleaning,
        Self::NeedsRepair,
    ];

    /// Returns the condition `event` leads to, or `None` if the event is
    /// not legal here.
    pub fn on(self, event: RoomEvent) -> Option<Self> {
        match (self, event) {
            (Self::CleanEmpty, RoomEvent::Occupy) => Some(Self::Occupied),
            (Self::Occupied, RoomEvent::EndUse) => Some(Self::NeedsCleaning),
            (Self::NeedsCleaning, RoomEvent::Clean) => Some(Self::CleanEmpty),
            (
                Self::CleanEmpty | Self::Occupied | Self::NeedsCleaning,
                RoomEvent::ReportFault,
            ) => Some(Self::NeedsRepair),
            (Self::NeedsRepair, RoomEvent::Repair) => Some(Self::NeedsCleaning),
            _ => None,
        }
    }

    pub fn hygiene(self) -> Hygiene {
        match self {
            Self::CleanEmpty | Self::Occupied => Hygiene::Clean,
            Self::NeedsCleaning | Self::NeedsRepair => Hygiene::NeedsCleaning,
        }
    }

    pub fn occupancy(self) -> Occupancy {
        match self {
            Self::Occupied => Occupancy::Occupied,
            _ => Occupancy::Empty,
        }
    }

    pub fn repair(self) -> Repair {
        match self {
            Self::NeedsRepair => Repair::NeedsRepair,
            _ => Repair::Normal,
        }
    }

    /// Wire label, e.g. `"CLEAN_EMPTY"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::CleanEmpty => "CLEAN_EMPTY",
            Self::Occupied => "OCCUPIED",
            Self::NeedsCleaning => "NEEDS_CLEANING",
            Self::NeedsRepair => "NEEDS_REPAIR",
        }
    }
}

impl std::fmt::Display for RoomCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Something that happened to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomEvent {
    Occupy,
    EndUse,
    Clean,
    ReportFault,
    Repair,
}

impl std::fmt::Display for RoomEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Occupy => "Occupy",
            Self::EndUse => "EndUse",
            Self::Clean => "Clean",
            Self::ReportFault => "ReportFault",
            Self::Repair => "Repair",
        };
        f.write_str(name)
    }
}

/// `event` is not legal in condition `from`. Nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{event} is not allowed while the room is {from}")]
pub struct IllegalTransition {
    pub from: RoomCondition,
    pub event: RoomEvent,
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// Holds the current condition and applies events to it.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: RoomCondition,
}

impl StateMachine {
    /// A new machine starts `CleanEmpty`.
    pub fn new() -> Self {
        Self {
            current: RoomCondition::CleanEmpty,
        }
    }

    pub fn current_state(&self) -> RoomCondition {
        self.current
    }

    /// Returns `true` if `event` would be accepted right now.
    pub fn can_apply(&self, event: RoomEvent) -> bool {
        self.current.on(event).is_some()
    }

    /// Applies `event`, returning the new condition.
    ///
    /// # Errors
    /// [`IllegalTransition`] if the event is not legal in the current
    /// condition; the condition is left untouched.
    pub fn apply(
        &mut self,
        event: RoomEvent,
    ) -> Result<RoomCondition, IllegalTransition> {
        let next = self.current.on(event).ok_or(IllegalTransition {
            from: self.current,
            event,
        })?;
        self.current = next;
        Ok(next)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
