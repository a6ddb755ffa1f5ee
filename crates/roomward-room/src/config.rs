//! Room configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one room coordinator.
///
/// Fixed at construction; a room never changes its capacity while running.
/// Deserializable so a host can load its room list from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Human-readable name, shown in status snapshots.
    pub name: String,

    /// Largest party the room accepts.
    pub capacity: u32,

    /// Whether a new application is announced to approvers. Off for the
    /// lobby, which only tracks who is connected.
    pub notify_approvers_on_apply: bool,

    /// Bound of the room actor's command channel. Callers wait when it
    /// is full.
    pub command_buffer: usize,
}

impl RoomConfig {
    /// A regular room with the given name and capacity.
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            ..Self::default()
        }
    }

    /// Configuration of the bootstrap room (room 0).
    pub fn lobby() -> Self {
        Self {
            name: "lobby".to_string(),
            capacity: 0,
            notify_approvers_on_apply: false,
            ..Self::default()
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "room".to_string(),
            capacity: 10,
            notify_approvers_on_apply: true,
            command_buffer: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.capacity, 10);
        assert!(config.notify_approvers_on_apply);
        assert_eq!(config.command_buffer, 64);
    }

    #[test]
    fn test_lobby_does_not_notify_approvers() {
        let lobby = RoomConfig::lobby();
        assert!(!lobby.notify_approvers_on_apply);
        assert_eq!(lobby.name, "lobby");
    }

    #[test]
    fn test_room_config_partial_json_uses_defaults() {
        let config: RoomConfig =
            serde_json::from_str(r#"{"name": "seminar", "capacity": 30}"#)
                .expect("should parse");
        assert_eq!(config.name, "seminar");
        assert_eq!(config.capacity, 30);
        assert!(config.notify_approvers_on_apply);
        assert_eq!(config.command_buffer, 64);
    }
}
