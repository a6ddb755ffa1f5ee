//! `RoomwardServer` builder and server loop.
//!
//! This is the entry point for hosting rooms over the network. It ties
//! together all the layers: transport → protocol → rooms.

use std::sync::Arc;
use std::time::{Duration, Instant};

use roomward_protocol::{Codec, JsonCodec, RoomId};
use roomward_room::{RoomConfig, RoomManager};
use roomward_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::RoomwardError;
use crate::handler::handle_connection;

/// How long a connection may stay silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Arc<Mutex<RoomManager>>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) started: Instant,
}

/// Builder for configuring and starting a Roomward server.
///
/// # Example
///
/// ```rust,no_run
/// use roomward::prelude::*;
///
/// # async fn run() -> Result<(), RoomwardError> {
/// let server = RoomwardServer::builder()
///     .bind("0.0.0.0:8080")
///     .room(RoomConfig::new("seminar", 30))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RoomwardServerBuilder {
    bind_addr: String,
    lobby: RoomConfig,
    rooms: Vec<RoomConfig>,
    idle_timeout: Duration,
}

impl RoomwardServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            lobby: RoomConfig::lobby(),
            rooms: Vec::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Replaces the lobby configuration.
    pub fn lobby(mut self, config: RoomConfig) -> Self {
        self.lobby = config;
        self
    }

    /// Adds a room to host.
    pub fn room(mut self, config: RoomConfig) -> Self {
        self.rooms.push(config);
        self
    }

    /// Adds several rooms to host.
    pub fn rooms(mut self, configs: impl IntoIterator<Item = RoomConfig>) -> Self {
        self.rooms.extend(configs);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and spawns the lobby and every configured room.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RoomwardServer<JsonCodec>, RoomwardError> {
        if self.idle_timeout.is_zero() {
            return Err(RoomwardError::Config(
                "idle timeout must be non-zero".to_string(),
            ));
        }

        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut manager = RoomManager::with_lobby(self.lobby);
        for config in self.rooms {
            manager.create_room(config);
        }

        let state = Arc::new(ServerState {
            rooms: Arc::new(Mutex::new(manager)),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            started: Instant::now(),
        });

        Ok(RoomwardServer { transport, state })
    }
}

impl Default for RoomwardServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Roomward server, bound and ready.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RoomwardServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RoomwardServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> RoomwardServerBuilder {
        RoomwardServerBuilder::new()
    }
}

impl<C> RoomwardServer<C>
where
    C: Codec + Send + Sync + 'static,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The hosted rooms. Shared with the connection handlers, so a
    /// [`LocalGateway`](crate::LocalGateway) built from it sees the same
    /// rooms remote clients do.
    pub fn rooms(&self) -> Arc<Mutex<RoomManager>> {
        Arc::clone(&self.state.rooms)
    }

    /// IDs of the hosted rooms, lobby excluded.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.state
            .rooms
            .lock()
            .await
            .room_ids()
            .into_iter()
            .filter(|id| !id.is_lobby())
            .collect()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), RoomwardError> {
        let rooms = self.state.rooms.lock().await.room_count();
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            rooms,
            "Roomward server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
