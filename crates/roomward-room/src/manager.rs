//! Room manager: creates, tracks, and resolves rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use roomward_protocol::{Identity, Role, RoomId, RoomStatus};

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle};

/// Counter for generating unique room IDs. Room 0 is the lobby.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// The rooms hosted by one process, plus the lobby.
///
/// The lobby (room 0) exists from construction until the manager is
/// dropped. Its subscriber registries double as the record of which
/// identity is connected in which role.
///
/// Constructors spawn actors and must be called inside a Tokio runtime.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
}

impl RoomManager {
    /// A manager with a default lobby and no other rooms.
    pub fn new() -> Self {
        Self::with_lobby(RoomConfig::lobby())
    }

    pub fn with_lobby(config: RoomConfig) -> Self {
        let mut rooms = HashMap::new();
        rooms.insert(RoomId::LOBBY, spawn_room(RoomId::LOBBY, config));
        tracing::info!(room_id = %RoomId::LOBBY, "lobby created");
        Self { rooms }
    }

    /// Creates a new room and returns its ID.
    pub fn create_room(&mut self, config: RoomConfig) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let name = config.name.clone();
        let handle = spawn_room(room_id, config);
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, %name, "room created");
        room_id
    }

    /// Resolves a room to a handle.
    pub fn get(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound(room_id))
    }

    pub fn lobby(&self) -> Result<RoomHandle, RoomError> {
        self.get(RoomId::LOBBY)
    }

    /// Whether `identity` is already connected in `role`.
    pub async fn check(&self, role: Role, identity: Identity) -> Result<bool, RoomError> {
        self.lobby()?.check(role, identity).await
    }

    /// Shuts down a room. The lobby cannot be destroyed.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        if room_id.is_lobby() {
            return Err(RoomError::InvalidState(
                "the lobby cannot be destroyed".to_string(),
            ));
        }
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        let _ = handle.shutdown().await;
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// Status of every room that answers, lobby excluded, ordered by ID.
    pub async fn list_rooms(&self) -> Vec<RoomStatus> {
        let mut statuses = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if handle.room_id().is_lobby() {
                continue;
            }
            if let Ok(status) = handle.status().await {
                statuses.push(status);
            }
        }
        statuses.sort_by_key(|s| s.room_id);
        statuses
    }

    /// Returns cloned handles to all rooms, lobby included.
    ///
    /// Useful when callers need to perform async operations on rooms
    /// without holding the manager lock.
    pub fn room_handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Number of rooms, lobby included.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stops every room actor, lobby included.
    pub async fn shutdown_all(&mut self) {
        for (room_id, handle) in self.rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%room_id, "room already stopped");
            }
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
