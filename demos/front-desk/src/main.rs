//! Front desk: a Roomward server hosting a handful of meeting rooms.
//!
//! Environment:
//! - `ROOMWARD_ADDR`: bind address (default `0.0.0.0:8080`)
//! - `ROOMWARD_ROOMS`: path to a JSON array of room configs; a built-in
//!   set of rooms is used when unset
//! - `RUST_LOG`: log filter (default `info`)

use std::path::Path;

use roomward::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

fn default_rooms() -> Vec<RoomConfig> {
    vec![
        RoomConfig::new("huddle", 4),
        RoomConfig::new("seminar", 10),
        RoomConfig::new("auditorium", 120),
    ]
}

/// Parses a JSON array of room configs. Missing fields take defaults.
fn parse_rooms(json: &str) -> Result<Vec<RoomConfig>, RoomwardError> {
    let rooms: Vec<RoomConfig> = serde_json::from_str(json)
        .map_err(|e| RoomwardError::Config(format!("invalid room list: {e}")))?;
    if rooms.is_empty() {
        return Err(RoomwardError::Config("room list is empty".to_string()));
    }
    if let Some(room) = rooms.iter().find(|r| r.capacity == 0) {
        return Err(RoomwardError::Config(format!(
            "room {:?} has zero capacity",
            room.name
        )));
    }
    Ok(rooms)
}

fn load_rooms(path: &Path) -> Result<Vec<RoomConfig>, RoomwardError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| RoomwardError::Config(format!("reading {}: {e}", path.display())))?;
    parse_rooms(&json)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("ROOMWARD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let rooms = match std::env::var_os("ROOMWARD_ROOMS") {
        Some(path) => load_rooms(Path::new(&path))?,
        None => default_rooms(),
    };

    let server = RoomwardServer::builder()
        .bind(&addr)
        .rooms(rooms)
        .build()
        .await?;

    for status in server.rooms().lock().await.list_rooms().await {
        tracing::info!(
            room_id = %status.room_id,
            name = %status.name,
            capacity = status.capacity,
            "hosting room"
        );
    }

    server.run().await?;
    Ok(())
}
