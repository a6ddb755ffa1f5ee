//! Subscriber registries: who gets pushed notifications, per role.

use std::collections::HashMap;
use std::sync::Arc;

use roomward_protocol::{Identity, Role};
use tokio::sync::mpsc;

/// A notification could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The receiving end is gone (connection closed, receiver dropped).
    #[error("subscriber is gone")]
    Gone,

    /// Delivery was attempted and failed.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// The callback capability a remote actor hands to a room.
///
/// `update` must not block: rooms deliver from a dedicated notifier task,
/// but one slow subscriber still delays the ones after it in the same
/// batch. Implementations that talk to the network should queue and
/// return.
pub trait Subscriber: Send + Sync + 'static {
    fn update(&self, message: &str) -> Result<(), NotifyError>;
}

/// A connection task draining an unbounded channel is the usual
/// subscriber: sending never blocks, and a closed channel reports
/// [`NotifyError::Gone`].
impl Subscriber for mpsc::UnboundedSender<String> {
    fn update(&self, message: &str) -> Result<(), NotifyError> {
        self.send(message.to_string()).map_err(|_| NotifyError::Gone)
    }
}

/// Shared handle to a subscriber. Rooms hold these; the owner keeps the
/// receiving end.
pub type SubscriberHandle = Arc<dyn Subscriber>;

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// One pending notification, produced under the room's critical section
/// and delivered after it.
pub struct Delivery {
    recipient: Option<Identity>,
    target: SubscriberHandle,
    message: String,
}

impl Delivery {
    pub fn new(
        recipient: Identity,
        target: SubscriberHandle,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Some(recipient),
            target,
            message: message.into(),
        }
    }

    /// A notice for whoever made the current call. The room only holds
    /// the caller's callback, not its identity.
    pub fn to_caller(target: SubscriberHandle, message: impl Into<String>) -> Self {
        Self {
            recipient: None,
            target,
            message: message.into(),
        }
    }

    /// `None` for caller notices.
    pub fn recipient(&self) -> Option<Identity> {
        self.recipient
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Calls the subscriber's `update`. Failures are logged and reported
    /// as `false`; they never propagate.
    pub fn deliver(&self) -> bool {
        match self.target.update(&self.message) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    recipient = ?self.recipient,
                    error = %e,
                    "notification dropped"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("recipient", &self.recipient)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SubscriberRegistry
// ---------------------------------------------------------------------------

/// Identity → callback for one role.
///
/// Entries live from `register` to `disconnect`, independent of what the
/// room is doing. A dead callback is skipped on delivery, never evicted.
pub struct SubscriberRegistry {
    role: Role,
    entries: HashMap<Identity, SubscriberHandle>,
}

impl SubscriberRegistry {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            entries: HashMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Inserts or replaces the callback for `identity`.
    ///
    /// Returns `true` if the identity was already registered, in which
    /// case only its callback changed.
    pub fn register(
        &mut self,
        identity: Identity,
        callback: SubscriberHandle,
    ) -> bool {
        self.entries.insert(identity, callback).is_some()
    }

    /// Removes `identity`. Returns whether it was present; absent is fine.
    pub fn disconnect(&mut self, identity: Identity) -> bool {
        self.entries.remove(&identity).is_some()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.entries.contains_key(&identity)
    }

    pub fn get(&self, identity: Identity) -> Option<&SubscriberHandle> {
        self.entries.get(&identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.entries.keys().copied().collect()
    }

    /// One pending delivery of `message` per registered subscriber.
    pub fn deliveries(&self, message: &str) -> Vec<Delivery> {
        self.entries
            .iter()
            .map(|(identity, target)| {
                Delivery::new(*identity, Arc::clone(target), message)
            })
            .collect()
    }

    /// Delivers `message` to every subscriber right now. Returns how many
    /// deliveries succeeded; failures are skipped.
    pub fn notify_all(&self, message: &str) -> usize {
        tracing::debug_span!("notify_all", role = %self.role)
            .in_scope(|| deliver_all(&self.deliveries(message)))
    }
}

/// Delivers each pending notification in order. Unreachable subscribers
/// are skipped and counted; the rest still get theirs.
///
/// Returns how many deliveries succeeded.
pub fn deliver_all(deliveries: &[Delivery]) -> usize {
    let total = deliveries.len();
    let delivered = deliveries.iter().filter(|d| d.deliver()).count();
    if delivered < total {
        tracing::warn!(delivered, total, "some subscribers were unreachable");
    }
    delivered
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// The four per-role registries of a room.
pub struct Registries {
    applicants: SubscriberRegistry,
    approvers: SubscriberRegistry,
    maintainers: SubscriberRegistry,
    cleaners: SubscriberRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            applicants: SubscriberRegistry::new(Role::Applicant),
            approvers: SubscriberRegistry::new(Role::Approver),
            maintainers: SubscriberRegistry::new(Role::Maintainer),
            cleaners: SubscriberRegistry::new(Role::Cleaner),
        }
    }

    pub fn get(&self, role: Role) -> &SubscriberRegistry {
        match role {
            Role::Applicant => &self.applicants,
            Role::Approver => &self.approvers,
            Role::Maintainer => &self.maintainers,
            Role::Cleaner => &self.cleaners,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut SubscriberRegistry {
        match role {
            Role::Applicant => &mut self.applicants,
            Role::Approver => &mut self.approvers,
            Role::Maintainer => &mut self.maintainers,
            Role::Cleaner => &mut self.cleaners,
        }
    }

    /// Total subscribers across roles.
    pub fn len(&self) -> usize {
        Role::ALL.iter().map(|r| self.get(*r).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending deliveries of `message` to every subscriber of every role.
    pub fn deliveries_to_all(&self, message: &str) -> Vec<Delivery> {
        Role::ALL
            .iter()
            .flat_map(|r| self.get(*r).deliveries(message))
            .collect()
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
