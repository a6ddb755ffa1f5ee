//! Room coordination for Roomward.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`RoomCoordinator`]: the room's condition, its applicants, and the
//! subscribers that want to hear about it.
//!
//! # Key types
//!
//! - [`StateMachine`] — the four-condition room lifecycle
//! - [`ApplicantPool`] — applications, occupant, reservation
//! - [`SubscriberRegistry`] — per-role notification targets
//! - [`RoomCoordinator`] — the rules tying them together
//! - [`RoomManager`] — creates rooms and hosts the lobby
//! - [`RoomHandle`] — send requests to a running room actor

mod config;
mod coordinator;
mod error;
mod machine;
mod manager;
mod pool;
mod registry;
mod room;

pub use config::RoomConfig;
pub use coordinator::RoomCoordinator;
pub use error::RoomError;
pub use machine::{
    Hygiene, IllegalTransition, Occupancy, Repair, RoomCondition, RoomEvent,
    StateMachine,
};
pub use manager::RoomManager;
pub use pool::{Applicant, ApplicantPool, Cancellation};
pub use registry::{
    Delivery, NotifyError, deliver_all, Registries, Subscriber, SubscriberHandle,
    SubscriberRegistry,
};
pub use room::RoomHandle;
