//! Room actor: an isolated Tokio task that owns one [`RoomCoordinator`].
//!
//! The actor processes one command at a time, so the coordinator's
//! read-decide-mutate sequence is never interleaved with another caller's.
//! Notifications leave through a second task so a slow subscriber cannot
//! hold the room.

use roomward_protocol::{Identity, Reply, Role, RoomId, RoomRequest, RoomStatus};
use tokio::sync::{mpsc, oneshot};

use crate::{
    Delivery, RoomConfig, RoomCoordinator, RoomError, SubscriberHandle, deliver_all,
};

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Run one request against the coordinator.
    Invoke {
        request: RoomRequest,
        caller: Option<SubscriberHandle>,
        reply: oneshot::Sender<Result<Reply, RoomError>>,
    },

    /// Stop the actor. Pending notifications are still delivered.
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone; the [`RoomManager`](crate::RoomManager) holds one per
/// room and hands out copies.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a request to the room and waits for its answer.
    ///
    /// Domain refusals come back as `Err` with a rejection variant (see
    /// [`RoomError::is_rejection`]); [`RoomError::Unavailable`] means the
    /// actor is gone.
    pub async fn invoke(
        &self,
        request: RoomRequest,
        caller: Option<SubscriberHandle>,
    ) -> Result<Reply, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Invoke {
                request,
                caller,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn apply(
        &self,
        identity: Identity,
        headcount: u32,
        callback: Option<SubscriberHandle>,
    ) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Apply { identity, headcount }, callback)
            .await
            .map(drop)
    }

    pub async fn approve(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Approve { identity }, None)
            .await
            .map(drop)
    }

    pub async fn reject(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Reject { identity }, None)
            .await
            .map(drop)
    }

    pub async fn end_use(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::EndUse { identity }, None)
            .await
            .map(drop)
    }

    pub async fn report_fault(
        &self,
        identity: Identity,
        role: Role,
    ) -> Result<(), RoomError> {
        self.invoke(RoomRequest::ReportFault { identity, role }, None)
            .await
            .map(drop)
    }

    pub async fn clean_complete(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::CleanComplete { identity }, None)
            .await
            .map(drop)
    }

    pub async fn repair_complete(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::RepairComplete { identity }, None)
            .await
            .map(drop)
    }

    pub async fn cancel(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Cancel { identity }, None)
            .await
            .map(drop)
    }

    /// Registers `callback` for `role`. Returns whether `identity` was
    /// already registered.
    pub async fn register(
        &self,
        role: Role,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> Result<bool, RoomError> {
        match self
            .invoke(RoomRequest::Register { role, identity }, Some(callback))
            .await?
        {
            Reply::Registered { already_present } => Ok(already_present),
            other => Err(unexpected(other)),
        }
    }

    pub async fn disconnect(&self, role: Role, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Disconnect { role, identity }, None)
            .await
            .map(drop)
    }

    /// Whether `identity` is registered for `role` in this room.
    pub async fn check(&self, role: Role, identity: Identity) -> Result<bool, RoomError> {
        match self
            .invoke(RoomRequest::Check { role, identity }, None)
            .await?
        {
            Reply::Checked { present } => Ok(present),
            other => Err(unexpected(other)),
        }
    }

    pub async fn go_offline(&self, identity: Identity) -> Result<(), RoomError> {
        self.invoke(RoomRequest::GoOffline { identity }, None)
            .await
            .map(drop)
    }

    pub async fn reattach(
        &self,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> Result<(), RoomError> {
        self.invoke(RoomRequest::Reattach { identity }, Some(callback))
            .await
            .map(drop)
    }

    pub async fn status(&self) -> Result<RoomStatus, RoomError> {
        match self.invoke(RoomRequest::Status, None).await? {
            Reply::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

fn unexpected(reply: Reply) -> RoomError {
    RoomError::InvalidState(format!("unexpected reply: {reply:?}"))
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    coordinator: RoomCoordinator,
    receiver: mpsc::Receiver<RoomCommand>,
    notifier: mpsc::UnboundedSender<Vec<Delivery>>,
}

impl RoomActor {
    async fn run(mut self) {
        let room_id = self.coordinator.room_id();
        tracing::info!(%room_id, name = %self.coordinator.config().name, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Invoke {
                    request,
                    caller,
                    reply,
                } => {
                    let result = self.coordinator.handle(request, caller);
                    self.flush();
                    let _ = reply.send(result);
                }
                RoomCommand::Shutdown => {
                    tracing::info!(%room_id, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    /// Hands the queued notifications to the notifier task.
    fn flush(&mut self) {
        let batch = self.coordinator.take_outbox();
        if batch.is_empty() {
            return;
        }
        if self.notifier.send(batch).is_err() {
            tracing::warn!(
                room_id = %self.coordinator.room_id(),
                "notifier stopped, notifications dropped"
            );
        }
    }
}

/// Delivers batches in the order the room produced them.
async fn deliver_batches(
    room_id: RoomId,
    mut batches: mpsc::UnboundedReceiver<Vec<Delivery>>,
) {
    let span = tracing::debug_span!("room_notifier", %room_id);
    while let Some(batch) = batches.recv().await {
        span.in_scope(|| deliver_all(&batch));
    }
}

/// Spawns a room actor and its notifier and returns a handle to the room.
///
/// `config.command_buffer` bounds the command channel; callers wait when
/// it is full.
pub(crate) fn spawn_room(room_id: RoomId, config: RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();

    let actor = RoomActor {
        coordinator: RoomCoordinator::new(room_id, config),
        receiver: rx,
        notifier: notify_tx,
    };

    tokio::spawn(deliver_batches(room_id, notify_rx));
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
