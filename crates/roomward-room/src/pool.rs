//! The applicant pool: who wants the room, who has it, who is next.

use std::collections::HashMap;
use std::sync::Arc;

use roomward_protocol::Identity;

use crate::{
    Delivery, RoomCondition, RoomError, RoomEvent, StateMachine,
    SubscriberHandle,
};

/// One identity's application for the room.
pub struct Applicant {
    identity: Identity,
    headcount: u32,
    online: bool,
    callback: Option<SubscriberHandle>,
}

impl Applicant {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn headcount(&self) -> u32 {
        self.headcount
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn callback(&self) -> Option<&SubscriberHandle> {
        self.callback.as_ref()
    }

    /// A pending direct message to this applicant, if it can be reached.
    pub fn notice(&self, message: impl Into<String>) -> Option<Delivery> {
        if !self.online {
            return None;
        }
        self.callback
            .as_ref()
            .map(|cb| Delivery::new(self.identity, Arc::clone(cb), message))
    }
}

impl std::fmt::Debug for Applicant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applicant")
            .field("identity", &self.identity)
            .field("headcount", &self.headcount)
            .field("online", &self.online)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Result of [`ApplicantPool::cancel`].
#[derive(Debug)]
pub enum Cancellation {
    /// The application was withdrawn; here is the removed record.
    Withdrawn(Applicant),
    /// The caller holds the room. Nothing was removed; the caller must go
    /// through end-of-use instead.
    Occupant,
}

/// Applications for one room, plus the occupant and the reservation slot.
///
/// Invariants:
/// - the occupant, when set, has a record in the pool;
/// - the reserved holder, when set, has a record and is not the occupant;
/// - there is at most one of each.
pub struct ApplicantPool {
    capacity: u32,
    applicants: HashMap<Identity, Applicant>,
    reserved: Option<Identity>,
    occupant: Option<Identity>,
}

impl ApplicantPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            applicants: HashMap::new(),
            reserved: None,
            occupant: None,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.applicants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applicants.is_empty()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.applicants.contains_key(&identity)
    }

    pub fn get(&self, identity: Identity) -> Option<&Applicant> {
        self.applicants.get(&identity)
    }

    pub fn occupant(&self) -> Option<Identity> {
        self.occupant
    }

    pub fn reserved(&self) -> Option<Identity> {
        self.reserved
    }

    /// Records an application.
    ///
    /// # Errors
    /// - [`RoomError::AlreadyApplied`] if `identity` already has one
    /// - [`RoomError::CapacityExceeded`] if the party doesn't fit
    pub fn apply(
        &mut self,
        identity: Identity,
        headcount: u32,
        callback: Option<SubscriberHandle>,
    ) -> Result<(), RoomError> {
        if self.applicants.contains_key(&identity) {
            return Err(RoomError::AlreadyApplied(identity));
        }
        if headcount > self.capacity {
            return Err(RoomError::CapacityExceeded {
                headcount,
                capacity: self.capacity,
            });
        }

        self.applicants.insert(
            identity,
            Applicant {
                identity,
                headcount,
                online: true,
                callback,
            },
        );
        Ok(())
    }

    /// Withdraws an application. The occupant is not removed; see
    /// [`Cancellation::Occupant`].
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if `identity` has no application.
    pub fn cancel(&mut self, identity: Identity) -> Result<Cancellation, RoomError> {
        if self.occupant == Some(identity) {
            return Ok(Cancellation::Occupant);
        }
        let applicant = self
            .applicants
            .remove(&identity)
            .ok_or(RoomError::NotFound(identity))?;
        if self.reserved == Some(identity) {
            self.reserved = None;
        }
        Ok(Cancellation::Withdrawn(applicant))
    }

    /// Keeps the application but stops delivering to it.
    pub fn mark_offline(&mut self, identity: Identity) -> Result<(), RoomError> {
        let applicant = self
            .applicants
            .get_mut(&identity)
            .ok_or(RoomError::NotFound(identity))?;
        applicant.online = false;
        applicant.callback = None;
        Ok(())
    }

    /// Brings an offline application back with a fresh callback.
    pub fn reattach(
        &mut self,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> Result<(), RoomError> {
        let applicant = self
            .applicants
            .get_mut(&identity)
            .ok_or(RoomError::NotFound(identity))?;
        applicant.online = true;
        applicant.callback = Some(callback);
        Ok(())
    }

    /// Hands the room to `identity` and moves the machine to `Occupied`.
    /// Clears the reservation slot.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if `identity` has no application
    /// - [`RoomError::InvalidState`] if it already holds the room or the
    ///   room is not clean and empty
    pub fn grant(
        &mut self,
        identity: Identity,
        machine: &mut StateMachine,
    ) -> Result<(), RoomError> {
        if !self.applicants.contains_key(&identity) {
            return Err(RoomError::NotFound(identity));
        }
        if self.occupant == Some(identity) {
            return Err(RoomError::InvalidState(format!(
                "{identity} already holds the room"
            )));
        }
        let condition = machine.current_state();
        if condition != RoomCondition::CleanEmpty {
            return Err(RoomError::InvalidState(format!(
                "cannot hand over a room that is {condition}"
            )));
        }

        machine.apply(RoomEvent::Occupy)?;
        self.reserved = None;
        self.occupant = Some(identity);
        Ok(())
    }

    /// Puts `identity` next in line. Any previous holder is bumped without
    /// notice and returned.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if `identity` has no application
    /// - [`RoomError::InvalidState`] if it holds the room or the slot
    pub fn reserve(&mut self, identity: Identity) -> Result<Option<Identity>, RoomError> {
        if !self.applicants.contains_key(&identity) {
            return Err(RoomError::NotFound(identity));
        }
        if self.occupant == Some(identity) {
            return Err(RoomError::InvalidState(format!(
                "{identity} already holds the room"
            )));
        }
        if self.reserved == Some(identity) {
            return Err(RoomError::InvalidState(format!(
                "{identity} already holds the reservation"
            )));
        }
        Ok(self.reserved.replace(identity))
    }

    /// Removes a reservation holder or a waiting applicant.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if `identity` is neither, including when it
    /// is the occupant.
    pub fn reject(&mut self, identity: Identity) -> Result<Applicant, RoomError> {
        if self.occupant == Some(identity) {
            return Err(RoomError::NotFound(identity));
        }
        let applicant = self
            .applicants
            .remove(&identity)
            .ok_or(RoomError::NotFound(identity))?;
        if self.reserved == Some(identity) {
            self.reserved = None;
        }
        Ok(applicant)
    }

    /// Ends the occupant's use: the machine moves to `NeedsCleaning` and
    /// the occupant's record is removed.
    ///
    /// # Errors
    /// [`RoomError::NotCurrentOccupant`] unless `identity` holds the room.
    pub fn end_use(
        &mut self,
        identity: Identity,
        machine: &mut StateMachine,
    ) -> Result<Applicant, RoomError> {
        if self.occupant != Some(identity) || !self.applicants.contains_key(&identity) {
            return Err(RoomError::NotCurrentOccupant(identity));
        }
        machine.apply(RoomEvent::EndUse)?;
        self.occupant = None;
        self.applicants
            .remove(&identity)
            .ok_or(RoomError::NotCurrentOccupant(identity))
    }

    /// Clears the occupant without touching its record (fault reported).
    pub fn release_occupant(&mut self) -> Option<Identity> {
        self.occupant.take()
    }

    /// Grants the room to the reserved holder, if there is one.
    pub fn promote_reserved(
        &mut self,
        machine: &mut StateMachine,
    ) -> Result<Option<Identity>, RoomError> {
        let Some(holder) = self.reserved else {
            return Ok(None);
        };
        self.grant(holder, machine)?;
        Ok(Some(holder))
    }

    /// Pending direct messages to every applicant except `skip`.
    pub fn notices_except(&self, skip: Identity, message: &str) -> Vec<Delivery> {
        self.applicants
            .values()
            .filter(|a| a.identity != skip)
            .filter_map(|a| a.notice(message))
            .collect()
    }

    /// A pending direct message to `identity`, if it can be reached.
    pub fn notice(&self, identity: Identity, message: impl Into<String>) -> Option<Delivery> {
        self.applicants.get(&identity).and_then(|a| a.notice(message))
    }
}
