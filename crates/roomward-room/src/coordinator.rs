//! The per-room coordinator: one state machine, one applicant pool, four
//! registries, and the rules that tie them together.
//!
//! The coordinator is synchronous and owns its state outright. It never
//! delivers notifications itself; every operation queues [`Delivery`]
//! values in an outbox that the owner drains with
//! [`RoomCoordinator::take_outbox`] once the operation has committed.

use roomward_protocol::{Identity, Reply, Role, RoomId, RoomRequest, RoomStatus};

use crate::pool::Cancellation;
use crate::{
    ApplicantPool, Delivery, Registries, RoomCondition, RoomConfig, RoomError,
    RoomEvent, StateMachine, SubscriberHandle,
};

pub struct RoomCoordinator {
    room_id: RoomId,
    config: RoomConfig,
    machine: StateMachine,
    pool: ApplicantPool,
    subscribers: Registries,
    outbox: Vec<Delivery>,
}

impl RoomCoordinator {
    /// A clean, empty room with no applicants and no subscribers.
    pub fn new(room_id: RoomId, config: RoomConfig) -> Self {
        Self {
            room_id,
            pool: ApplicantPool::new(config.capacity),
            config,
            machine: StateMachine::new(),
            subscribers: Registries::new(),
            outbox: Vec::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn condition(&self) -> RoomCondition {
        self.machine.current_state()
    }

    pub fn pool(&self) -> &ApplicantPool {
        &self.pool
    }

    pub fn subscribers(&self) -> &Registries {
        &self.subscribers
    }

    /// Drains the notifications queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.outbox)
    }

    /// Dispatches a wire request.
    ///
    /// `caller` is the requester's own callback. It receives direct
    /// notices on refusal, becomes the applicant's callback on `apply`,
    /// and is the registered callback on `register` and `reattach`.
    ///
    /// A domain refusal is returned as `Err` after being logged and
    /// queued as a direct notice to `caller`; the room is unchanged.
    pub fn handle(
        &mut self,
        request: RoomRequest,
        caller: Option<SubscriberHandle>,
    ) -> Result<Reply, RoomError> {
        let op = request.name();
        let subject = request.identity();

        let result = match request {
            RoomRequest::Apply {
                identity,
                headcount,
            } => self
                .apply(identity, headcount, caller.clone())
                .map(|()| Reply::Done),
            RoomRequest::Approve { identity } => {
                self.approve(identity).map(|()| Reply::Done)
            }
            RoomRequest::Reject { identity } => {
                self.reject(identity).map(|()| Reply::Done)
            }
            RoomRequest::EndUse { identity } => {
                self.end_use(identity).map(|()| Reply::Done)
            }
            RoomRequest::ReportFault { identity, role } => {
                self.report_fault(identity, role).map(|()| Reply::Done)
            }
            RoomRequest::CleanComplete { identity } => {
                self.clean_complete(identity).map(|()| Reply::Done)
            }
            RoomRequest::RepairComplete { identity } => {
                self.repair_complete(identity).map(|()| Reply::Done)
            }
            RoomRequest::Cancel { identity } => {
                self.cancel(identity).map(|()| Reply::Done)
            }
            RoomRequest::Register { role, identity } => match caller.clone() {
                Some(callback) => Ok(Reply::Registered {
                    already_present: self.register(role, identity, callback),
                }),
                None => Err(RoomError::InvalidState(
                    "registration requires a callback".to_string(),
                )),
            },
            RoomRequest::Disconnect { role, identity } => {
                self.disconnect(role, identity);
                Ok(Reply::Done)
            }
            RoomRequest::Check { role, identity } => Ok(Reply::Checked {
                present: self.check(role, identity),
            }),
            RoomRequest::GoOffline { identity } => {
                self.go_offline(identity).map(|()| Reply::Done)
            }
            RoomRequest::Reattach { identity } => match caller.clone() {
                Some(callback) => {
                    self.reattach(identity, callback).map(|()| Reply::Done)
                }
                None => Err(RoomError::InvalidState(
                    "reattach requires a callback".to_string(),
                )),
            },
            RoomRequest::Status => Ok(Reply::Status(self.status())),
        };

        if let Err(e) = &result {
            tracing::warn!(
                room_id = %self.room_id,
                op,
                subject = ?subject,
                error = %e,
                "request refused"
            );
            if let Some(callback) = caller {
                self.outbox.push(Delivery::to_caller(
                    callback,
                    format!("{}: {op} refused: {e}", self.room_id),
                ));
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // Applicant operations
    // -----------------------------------------------------------------------

    /// Records an application for `headcount` people.
    pub fn apply(
        &mut self,
        identity: Identity,
        headcount: u32,
        callback: Option<SubscriberHandle>,
    ) -> Result<(), RoomError> {
        self.pool.apply(identity, headcount, callback)?;
        tracing::info!(
            room_id = %self.room_id,
            %identity,
            headcount,
            applicants = self.pool.len(),
            "application received"
        );

        self.direct(
            identity,
            format!("{}: application for {headcount} received", self.room_id),
        );
        if self.config.notify_approvers_on_apply {
            let notice =
                format!("{}: {identity} applied for {headcount}", self.room_id);
            self.alert(Role::Approver, &notice);
        }
        self.broadcast_status();
        Ok(())
    }

    /// Hands over the room if it is clean and empty, otherwise reserves it.
    pub fn approve(&mut self, identity: Identity) -> Result<(), RoomError> {
        if self.machine.current_state() == RoomCondition::CleanEmpty {
            self.pool.grant(identity, &mut self.machine)?;
            tracing::info!(
                room_id = %self.room_id,
                %identity,
                "approved; room occupied"
            );
            self.direct(
                identity,
                format!("{}: approved, the room is yours", self.room_id),
            );
        } else {
            let bumped = self.pool.reserve(identity)?;
            if let Some(previous) = bumped {
                tracing::info!(
                    room_id = %self.room_id,
                    %previous,
                    "reservation overwritten"
                );
            }
            tracing::info!(
                room_id = %self.room_id,
                %identity,
                condition = %self.machine.current_state(),
                "approved; room reserved"
            );
            self.direct(
                identity,
                format!(
                    "{}: approved and reserved, waiting for the room to be ready",
                    self.room_id
                ),
            );
        }
        self.broadcast_status();
        Ok(())
    }

    /// Removes a waiting applicant or the reservation holder.
    pub fn reject(&mut self, identity: Identity) -> Result<(), RoomError> {
        let applicant = self.pool.reject(identity)?;
        tracing::info!(room_id = %self.room_id, %identity, "application rejected");
        if let Some(notice) =
            applicant.notice(format!("{}: application rejected", self.room_id))
        {
            self.outbox.push(notice);
        }
        self.broadcast_status();
        Ok(())
    }

    /// Ends the occupant's use. The room then needs cleaning.
    pub fn end_use(&mut self, identity: Identity) -> Result<(), RoomError> {
        let applicant = self.pool.end_use(identity, &mut self.machine)?;
        tracing::info!(room_id = %self.room_id, %identity, "use ended");
        if let Some(notice) =
            applicant.notice(format!("{}: use finished, thank you", self.room_id))
        {
            self.outbox.push(notice);
        }
        self.alert(
            Role::Cleaner,
            &format!("{}: needs cleaning", self.room_id),
        );
        self.broadcast_status();
        Ok(())
    }

    /// Withdraws an application. The occupant's cancel ends its use.
    pub fn cancel(&mut self, identity: Identity) -> Result<(), RoomError> {
        match self.pool.cancel(identity)? {
            Cancellation::Occupant => self.end_use(identity),
            Cancellation::Withdrawn(applicant) => {
                tracing::info!(
                    room_id = %self.room_id,
                    %identity,
                    "application cancelled"
                );
                if let Some(notice) = applicant
                    .notice(format!("{}: application cancelled", self.room_id))
                {
                    self.outbox.push(notice);
                }
                self.broadcast_status();
                Ok(())
            }
        }
    }

    pub fn go_offline(&mut self, identity: Identity) -> Result<(), RoomError> {
        self.pool.mark_offline(identity)?;
        tracing::debug!(room_id = %self.room_id, %identity, "applicant offline");
        Ok(())
    }

    /// Brings an offline applicant back and tells it where things stand.
    pub fn reattach(
        &mut self,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> Result<(), RoomError> {
        self.pool.reattach(identity, callback)?;
        tracing::debug!(room_id = %self.room_id, %identity, "applicant reattached");
        let line = self.status_line();
        self.direct(identity, format!("welcome back, {line}"));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Staff operations
    // -----------------------------------------------------------------------

    /// Marks the room broken. Whoever held it loses it but keeps their
    /// application.
    pub fn report_fault(
        &mut self,
        identity: Identity,
        role: Role,
    ) -> Result<(), RoomError> {
        self.machine.apply(RoomEvent::ReportFault)?;
        let evicted = self.pool.release_occupant();
        tracing::info!(
            room_id = %self.room_id,
            %identity,
            role = %role,
            evicted = ?evicted,
            "fault reported"
        );

        if let Some(occupant) = evicted {
            self.direct(
                occupant,
                format!("{}: a fault was reported, your use has ended", self.room_id),
            );
        }
        self.alert(
            Role::Maintainer,
            &format!("{}: needs repair (reported by {role} {identity})", self.room_id),
        );
        self.broadcast_status();
        Ok(())
    }

    /// Cleaning done. A reservation holder is moved in straight away.
    pub fn clean_complete(&mut self, identity: Identity) -> Result<(), RoomError> {
        self.machine.apply(RoomEvent::Clean)?;
        tracing::info!(room_id = %self.room_id, %identity, "cleaning complete");

        match self.pool.promote_reserved(&mut self.machine) {
            Ok(Some(holder)) => {
                tracing::info!(
                    room_id = %self.room_id,
                    %holder,
                    "reservation promoted; room occupied"
                );
                self.direct(
                    holder,
                    format!("{}: the room is ready for you", self.room_id),
                );
                let wait = format!("{}: occupied, please wait", self.room_id);
                let notices = self.pool.notices_except(holder, &wait);
                self.outbox.extend(notices);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    room_id = %self.room_id,
                    error = %e,
                    "reservation could not be promoted"
                );
            }
        }
        self.broadcast_status();
        Ok(())
    }

    /// Repair done. The room still needs cleaning afterwards.
    pub fn repair_complete(&mut self, identity: Identity) -> Result<(), RoomError> {
        self.machine.apply(RoomEvent::Repair)?;
        tracing::info!(room_id = %self.room_id, %identity, "repair complete");
        self.alert(
            Role::Cleaner,
            &format!("{}: needs cleaning", self.room_id),
        );
        self.broadcast_status();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Returns `true` if `identity` was already registered for `role`.
    pub fn register(
        &mut self,
        role: Role,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> bool {
        let already = self
            .subscribers
            .get_mut(role)
            .register(identity, callback);
        tracing::info!(
            room_id = %self.room_id,
            role = %role,
            %identity,
            already,
            "subscriber registered"
        );
        already
    }

    pub fn disconnect(&mut self, role: Role, identity: Identity) {
        if self.subscribers.get_mut(role).disconnect(identity) {
            tracing::info!(
                room_id = %self.room_id,
                role = %role,
                %identity,
                "subscriber disconnected"
            );
        }
    }

    pub fn check(&self, role: Role, identity: Identity) -> bool {
        self.subscribers.get(role).contains(identity)
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            room_id: self.room_id,
            name: self.config.name.clone(),
            condition: self.machine.current_state().label().to_string(),
            capacity: self.config.capacity,
            occupant: self.pool.occupant(),
            reserved: self.pool.reserved(),
            applicants: self.pool.len(),
            subscribers: self.subscribers.len(),
        }
    }

    /// `"R-<id> is <CONDITION>"`.
    pub fn status_line(&self) -> String {
        format!("{} is {}", self.room_id, self.machine.current_state())
    }

    // -----------------------------------------------------------------------
    // Outbox
    // -----------------------------------------------------------------------

    fn direct(&mut self, identity: Identity, message: String) {
        if let Some(notice) = self.pool.notice(identity, message) {
            self.outbox.push(notice);
        }
    }

    fn alert(&mut self, role: Role, message: &str) {
        let deliveries = self.subscribers.get(role).deliveries(message);
        self.outbox.extend(deliveries);
    }

    fn broadcast_status(&mut self) {
        let line = self.status_line();
        let deliveries = self.subscribers.deliveries_to_all(&line);
        self.outbox.extend(deliveries);
    }
}

impl std::fmt::Debug for RoomCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomCoordinator")
            .field("room_id", &self.room_id)
            .field("condition", &self.machine.current_state())
            .field("occupant", &self.pool.occupant())
            .field("reserved", &self.pool.reserved())
            .field("applicants", &self.pool.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{NotifyError, Subscriber};

    #[derive(Default)]
    struct Inbox(Mutex<Vec<String>>);

    impl Inbox {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn saw(&self, needle: &str) -> bool {
            self.messages().iter().any(|m| m.contains(needle))
        }
    }

    impl Subscriber for Inbox {
        fn update(&self, message: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn id(n: u64) -> Identity {
        Identity(n)
    }

    fn room() -> RoomCoordinator {
        RoomCoordinator::new(RoomId(1), RoomConfig::new("seminar", 10))
    }

    /// Delivers the outbox synchronously, as the notifier task would.
    fn flush(coord: &mut RoomCoordinator) {
        for delivery in coord.take_outbox() {
            delivery.deliver();
        }
    }

    // =====================================================================
    // Scenarios
    // =====================================================================

    #[test]
    fn test_approve_clean_room_occupies_it() {
        let mut coord = room();
        coord.apply(id(1), 4, None).expect("apply");
        coord.approve(id(1)).expect("approve");

        assert_eq!(coord.condition(), RoomCondition::Occupied);
        assert_eq!(coord.pool().occupant(), Some(id(1)));
    }

    #[test]
    fn test_approve_occupied_room_reserves_it() {
        let mut coord = room();
        coord.apply(id(1), 4, None).unwrap();
        coord.approve(id(1)).unwrap();

        coord.apply(id(2), 2, None).unwrap();
        coord.approve(id(2)).unwrap();

        assert_eq!(coord.condition(), RoomCondition::Occupied);
        assert_eq!(coord.pool().occupant(), Some(id(1)));
        assert_eq!(coord.pool().reserved(), Some(id(2)));
    }

    #[test]
    fn test_clean_complete_promotes_reserved_holder() {
        let mut coord = room();
        let second = Arc::new(Inbox::default());
        let third = Arc::new(Inbox::default());
        coord.apply(id(1), 4, None).unwrap();
        coord.approve(id(1)).unwrap();
        coord.apply(id(2), 2, Some(second.clone())).unwrap();
        coord.apply(id(3), 2, Some(third.clone())).unwrap();
        coord.approve(id(2)).unwrap();

        coord.end_use(id(1)).unwrap();
        assert_eq!(coord.condition(), RoomCondition::NeedsCleaning);

        coord.clean_complete(id(50)).unwrap();
        flush(&mut coord);

        assert_eq!(coord.condition(), RoomCondition::Occupied);
        assert_eq!(coord.pool().occupant(), Some(id(2)));
        assert_eq!(coord.pool().reserved(), None);
        assert!(second.saw("ready for you"));
        assert!(third.saw("occupied, please wait"));
        assert!(!second.saw("please wait"));
    }

    #[test]
    fn test_reject_waiting_applicant_tells_it() {
        let mut coord = room();
        let waiting = Arc::new(Inbox::default());
        coord.apply(id(1), 2, Some(waiting.clone())).unwrap();

        coord.reject(id(1)).unwrap();
        flush(&mut coord);

        assert!(waiting.saw("R-1: application rejected"));
        assert!(!coord.pool().contains(id(1)));
    }

    #[test]
    fn test_reject_reservation_holder_tells_it_and_frees_slot() {
        let mut coord = room();
        let holder = Arc::new(Inbox::default());
        coord.apply(id(1), 4, None).unwrap();
        coord.approve(id(1)).unwrap();
        coord.apply(id(2), 2, Some(holder.clone())).unwrap();
        coord.approve(id(2)).unwrap();

        coord.reject(id(2)).unwrap();
        flush(&mut coord);

        assert!(holder.saw("R-1: application rejected"));
        assert_eq!(coord.pool().reserved(), None);
        assert_eq!(coord.pool().occupant(), Some(id(1)));
    }

    #[test]
    fn test_cancel_waiting_applicant_tells_it() {
        let mut coord = room();
        let waiting = Arc::new(Inbox::default());
        coord.apply(id(3), 2, Some(waiting.clone())).unwrap();

        coord.cancel(id(3)).unwrap();
        flush(&mut coord);

        assert!(waiting.saw("R-1: application cancelled"));
        assert!(coord.pool().is_empty());
    }

    #[test]
    fn test_handle_refused_approve_notice_goes_to_caller_unaddressed() {
        let mut coord = room();
        let approver = Arc::new(Inbox::default());

        let result = coord.handle(
            RoomRequest::Approve { identity: id(9) },
            Some(approver.clone()),
        );
        let pending = coord.take_outbox();

        assert!(matches!(result, Err(RoomError::NotFound(_))));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient(), None);
        assert!(pending[0].deliver());
        assert!(approver.saw("approve refused"));
    }

    #[test]
    fn test_apply_over_capacity_is_refused() {
        let mut coord = room();
        let result = coord.apply(id(1), 15, None);

        assert!(matches!(result, Err(RoomError::CapacityExceeded { .. })));
        assert!(coord.pool().is_empty());
    }

    #[test]
    fn test_repair_complete_on_clean_room_is_illegal() {
        let mut coord = room();
        let result = coord.repair_complete(id(40));

        assert!(matches!(result, Err(RoomError::IllegalTransition(_))));
        assert_eq!(coord.condition(), RoomCondition::CleanEmpty);
    }

    // =====================================================================
    // Faults and repair
    // =====================================================================

    #[test]
    fn test_report_fault_evicts_occupant_but_keeps_record() {
        let mut coord = room();
        coord.apply(id(1), 4, None).unwrap();
        coord.approve(id(1)).unwrap();

        coord.report_fault(id(1), Role::Applicant).unwrap();

        assert_eq!(coord.condition(), RoomCondition::NeedsRepair);
        assert_eq!(coord.pool().occupant(), None);
        assert!(coord.pool().contains(id(1)));
    }

    #[test]
    fn test_report_fault_twice_is_illegal() {
        let mut coord = room();
        coord.report_fault(id(30), Role::Maintainer).unwrap();
        let result = coord.report_fault(id(30), Role::Maintainer);
        assert!(matches!(result, Err(RoomError::IllegalTransition(_))));
    }

    #[test]
    fn test_repair_then_clean_returns_to_clean_empty() {
        let mut coord = room();
        let cleaner = Arc::new(Inbox::default());
        coord.register(Role::Cleaner, id(50), cleaner.clone());

        coord.report_fault(id(50), Role::Cleaner).unwrap();
        coord.repair_complete(id(40)).unwrap();
        assert_eq!(coord.condition(), RoomCondition::NeedsCleaning);
        coord.clean_complete(id(50)).unwrap();
        flush(&mut coord);

        assert_eq!(coord.condition(), RoomCondition::CleanEmpty);
        assert!(cleaner.saw("R-1: needs cleaning"));
        assert!(cleaner.saw("R-1 is CLEAN_EMPTY"));
    }

    // =====================================================================
    // Notifications
    // =====================================================================

    #[test]
    fn test_status_broadcast_reaches_every_role() {
        let mut coord = room();
        let inboxes: Vec<Arc<Inbox>> =
            Role::ALL.iter().map(|_| Arc::new(Inbox::default())).collect();
        for (n, (role, inbox)) in Role::ALL.iter().zip(&inboxes).enumerate() {
            coord.register(*role, id(100 + n as u64), inbox.clone());
        }

        coord.apply(id(1), 2, None).unwrap();
        coord.approve(id(1)).unwrap();
        flush(&mut coord);

        for inbox in &inboxes {
            assert!(inbox.saw("R-1 is OCCUPIED"));
        }
    }

    #[test]
    fn test_apply_notifies_approvers_unless_disabled() {
        let approver = Arc::new(Inbox::default());
        let mut coord = room();
        coord.register(Role::Approver, id(20), approver.clone());
        coord.apply(id(1), 3, None).unwrap();
        flush(&mut coord);
        assert!(approver.saw("#1 applied for 3"));

        let quiet = Arc::new(Inbox::default());
        let mut lobby = RoomCoordinator::new(RoomId::LOBBY, RoomConfig::lobby());
        lobby.register(Role::Approver, id(20), quiet.clone());
        let _ = lobby.apply(id(1), 0, None);
        flush(&mut lobby);
        assert!(!quiet.saw("applied"));
    }

    #[test]
    fn test_end_use_alerts_cleaners() {
        let mut coord = room();
        let cleaner = Arc::new(Inbox::default());
        let occupant = Arc::new(Inbox::default());
        coord.register(Role::Cleaner, id(50), cleaner.clone());
        coord.apply(id(1), 2, Some(occupant.clone())).unwrap();
        coord.approve(id(1)).unwrap();

        coord.end_use(id(1)).unwrap();
        flush(&mut coord);

        assert!(cleaner.saw("needs cleaning"));
        assert!(occupant.saw("approved"));
        assert!(occupant.saw("finished"));
    }

    #[test]
    fn test_handle_refusal_notifies_caller_directly() {
        let mut coord = room();
        let caller = Arc::new(Inbox::default());

        let result = coord.handle(
            RoomRequest::Apply {
                identity: id(1),
                headcount: 15,
            },
            Some(caller.clone()),
        );
        flush(&mut coord);

        assert!(matches!(result, Err(RoomError::CapacityExceeded { .. })));
        assert!(caller.saw("apply refused"));
    }

    #[test]
    fn test_offline_applicant_skipped_until_reattached() {
        let mut coord = room();
        let first = Arc::new(Inbox::default());
        let second = Arc::new(Inbox::default());
        coord.apply(id(1), 2, Some(first.clone())).unwrap();
        flush(&mut coord);
        coord.go_offline(id(1)).unwrap();

        coord.approve(id(1)).unwrap();
        flush(&mut coord);
        assert!(!first.saw("approved"));

        coord.reattach(id(1), second.clone()).unwrap();
        flush(&mut coord);
        assert!(second.saw("welcome back, R-1 is OCCUPIED"));
    }

    // =====================================================================
    // handle()
    // =====================================================================

    #[test]
    fn test_handle_register_without_callback_is_invalid() {
        let mut coord = room();
        let result = coord.handle(
            RoomRequest::Register {
                role: Role::Cleaner,
                identity: id(50),
            },
            None,
        );
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_handle_register_and_check() {
        let mut coord = room();
        let callback: SubscriberHandle = Arc::new(Inbox::default());
        let register = RoomRequest::Register {
            role: Role::Approver,
            identity: id(20),
        };

        let first = coord.handle(register.clone(), Some(callback.clone())).unwrap();
        let second = coord.handle(register, Some(callback)).unwrap();
        let checked = coord
            .handle(
                RoomRequest::Check {
                    role: Role::Approver,
                    identity: id(20),
                },
                None,
            )
            .unwrap();

        assert_eq!(first, Reply::Registered { already_present: false });
        assert_eq!(second, Reply::Registered { already_present: true });
        assert_eq!(checked, Reply::Checked { present: true });
    }

    #[test]
    fn test_handle_cancel_by_occupant_ends_use() {
        let mut coord = room();
        coord.apply(id(1), 2, None).unwrap();
        coord.approve(id(1)).unwrap();

        coord
            .handle(RoomRequest::Cancel { identity: id(1) }, None)
            .expect("cancel");

        assert_eq!(coord.condition(), RoomCondition::NeedsCleaning);
        assert!(coord.pool().is_empty());
    }

    #[test]
    fn test_handle_status_reports_snapshot() {
        let mut coord = room();
        coord.apply(id(1), 2, None).unwrap();

        let reply = coord.handle(RoomRequest::Status, None).unwrap();

        let Reply::Status(status) = reply else {
            panic!("expected status");
        };
        assert_eq!(status.condition, "CLEAN_EMPTY");
        assert_eq!(status.applicants, 1);
        assert_eq!(status.capacity, 10);
    }

    #[test]
    fn test_approve_second_identity_bumps_reservation() {
        let mut coord = room();
        for n in 1..=3 {
            coord.apply(id(n), 2, None).unwrap();
        }
        coord.approve(id(1)).unwrap();
        coord.approve(id(2)).unwrap();
        coord.approve(id(3)).unwrap();

        assert_eq!(coord.pool().reserved(), Some(id(3)));
        assert!(coord.pool().contains(id(2)));
    }
}
