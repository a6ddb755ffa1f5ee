//! Remote invocation: reaching a room from outside its process.
//!
//! [`RoomGateway`] is the seam. [`GatewayClient`] implements it over a
//! WebSocket connection to a [`RoomwardServer`](crate::RoomwardServer);
//! [`LocalGateway`] implements it over an in-process [`RoomManager`].
//! Either way a domain refusal is an ordinary [`Reply::Rejected`] and only
//! failing to reach the room is a [`GatewayError`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use roomward_protocol::{
    Codec, Envelope, Identity, JsonCodec, PROTOCOL_VERSION, Payload,
    ProtocolError, Reply, Role, RoomId, RoomRequest, SystemMessage,
};
use roomward_room::{RoomError, RoomManager, SubscriberHandle};
use roomward_transport::{ClientConnection, Connection};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long a call waits for its reply unless configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Failing to reach a room, as opposed to the room saying no.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The connection could not be made or was lost.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// No reply arrived in time.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The peer sent something we could not understand.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server refused the call outside any room's rules (unknown
    /// room, duplicate identity, bad handshake).
    #[error("refused ({code}): {message}")]
    Refused { code: u16, message: String },
}

/// Something that can invoke requests on rooms.
pub trait RoomGateway {
    /// Invokes `request` on `room_id` and returns the room's answer.
    async fn invoke(&self, room_id: RoomId, request: RoomRequest) -> Result<Reply, GatewayError>;
}

/// Turns a room-side error into the reply a remote caller sees.
///
/// Domain refusals become [`Reply::Rejected`]; anything else is `None`.
pub fn rejection(err: &RoomError) -> Option<Reply> {
    err.reject_reason().map(|reason| Reply::Rejected {
        reason,
        message: err.to_string(),
    })
}

// ---------------------------------------------------------------------------
// LocalGateway
// ---------------------------------------------------------------------------

/// A gateway over rooms hosted in this process.
#[derive(Clone)]
pub struct LocalGateway {
    rooms: Arc<Mutex<RoomManager>>,
    callback: Option<SubscriberHandle>,
}

impl LocalGateway {
    pub fn new(rooms: Arc<Mutex<RoomManager>>) -> Self {
        Self {
            rooms,
            callback: None,
        }
    }

    /// Sets the callback passed along with every call.
    pub fn with_callback(mut self, callback: SubscriberHandle) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl RoomGateway for LocalGateway {
    async fn invoke(&self, room_id: RoomId, request: RoomRequest) -> Result<Reply, GatewayError> {
        let handle = match self.rooms.lock().await.get(room_id) {
            Ok(handle) => handle,
            Err(e) => {
                return Err(GatewayError::Refused {
                    code: 404,
                    message: e.to_string(),
                });
            }
        };

        match handle.invoke(request, self.callback.clone()).await {
            Ok(reply) => Ok(reply),
            Err(e) => rejection(&e)
                .ok_or_else(|| GatewayError::TransportUnavailable(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayClient
// ---------------------------------------------------------------------------

type Pending = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<Payload>>>>;

/// A connected client of a Roomward server.
///
/// Calls are correlated by `seq`, so one client can have many calls in
/// flight. Pushed notifications queue up until read with
/// [`next_notification`](Self::next_notification).
pub struct GatewayClient {
    conn: Arc<ClientConnection>,
    codec: JsonCodec,
    role: Role,
    identity: Identity,
    next_seq: AtomicU64,
    pending: Pending,
    notifications: Mutex<mpsc::UnboundedReceiver<String>>,
    call_timeout: Duration,
    reader: JoinHandle<()>,
}

impl GatewayClient {
    /// Connects to `addr` and completes the handshake as `role`/`identity`.
    ///
    /// # Errors
    /// - [`GatewayError::TransportUnavailable`] if the server can't be reached
    /// - [`GatewayError::Refused`] if the server rejects the handshake
    ///   (409 when the identity is already connected in this role)
    pub async fn connect(addr: &str, role: Role, identity: Identity) -> Result<Self, GatewayError> {
        let conn = ClientConnection::connect(addr)
            .await
            .map_err(|e| GatewayError::TransportUnavailable(e.to_string()))?;
        let codec = JsonCodec;

        let hello = Envelope::system(
            0,
            SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                role,
                identity,
            },
        );
        send_envelope(&conn, &codec, &hello).await?;

        let data = match tokio::time::timeout(DEFAULT_CALL_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                return Err(GatewayError::TransportUnavailable(
                    "connection closed during handshake".into(),
                ));
            }
            Ok(Err(e)) => return Err(GatewayError::TransportUnavailable(e.to_string())),
            Err(_) => return Err(GatewayError::Timeout(DEFAULT_CALL_TIMEOUT)),
        };

        let ack: Envelope = codec.decode(&data)?;
        match ack.payload {
            Payload::System(SystemMessage::HandshakeAck { .. }) => {}
            Payload::System(SystemMessage::Error { code, message }) => {
                return Err(GatewayError::Refused { code, message });
            }
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "expected HandshakeAck, got {other:?}"
                ))
                .into());
            }
        }
        tracing::debug!(%role, %identity, "connected");

        let conn = Arc::new(conn);
        let pending: Pending = Arc::default();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(
            Arc::clone(&conn),
            Arc::clone(&pending),
            notify_tx,
        ));

        Ok(Self {
            conn,
            codec,
            role,
            identity,
            next_seq: AtomicU64::new(1),
            pending,
            notifications: Mutex::new(notify_rx),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            reader,
        })
    }

    /// Sets how long each call waits for its reply.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Waits for the next pushed notification. `None` once the connection
    /// is gone and the queue is drained.
    pub async fn next_notification(&self) -> Option<String> {
        self.notifications.lock().await.recv().await
    }

    /// Round-trips a heartbeat and returns the server's clock reading.
    pub async fn heartbeat(&self) -> Result<u64, GatewayError> {
        let client_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let payload = self
            .round_trip(Payload::System(SystemMessage::Heartbeat { client_time }))
            .await?;
        match payload {
            Payload::System(SystemMessage::HeartbeatAck { server_time, .. }) => Ok(server_time),
            other => Err(unexpected(other)),
        }
    }

    /// Says goodbye and closes the connection.
    pub async fn close(self) -> Result<(), GatewayError> {
        let bye = Envelope::system(
            0,
            SystemMessage::Disconnect {
                reason: "client closing".into(),
            },
        );
        send_envelope(&self.conn, &self.codec, &bye).await?;
        self.conn
            .close()
            .await
            .map_err(|e| GatewayError::TransportUnavailable(e.to_string()))
    }

    async fn round_trip(&self, payload: Payload) -> Result<Payload, GatewayError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(seq, tx);

        if let Err(e) = send_envelope(&self.conn, &self.codec, &Envelope::new(seq, payload)).await {
            self.forget(seq);
            return Err(e);
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(GatewayError::TransportUnavailable(
                "connection closed before reply".into(),
            )),
            Err(_) => {
                self.forget(seq);
                Err(GatewayError::Timeout(self.call_timeout))
            }
        }
    }

    fn forget(&self, seq: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&seq);
    }
}

impl RoomGateway for GatewayClient {
    async fn invoke(&self, room_id: RoomId, request: RoomRequest) -> Result<Reply, GatewayError> {
        match self.round_trip(Payload::Call { room_id, request }).await? {
            Payload::Reply(reply) => Ok(reply),
            Payload::System(SystemMessage::Error { code, message }) => {
                Err(GatewayError::Refused { code, message })
            }
            other => Err(unexpected(other)),
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("conn", &self.conn.id())
            .field("role", &self.role)
            .field("identity", &self.identity)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn unexpected(payload: Payload) -> GatewayError {
    ProtocolError::InvalidMessage(format!("unexpected payload: {payload:?}")).into()
}

async fn send_envelope(
    conn: &ClientConnection,
    codec: &JsonCodec,
    envelope: &Envelope,
) -> Result<(), GatewayError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes)
        .await
        .map_err(|e| GatewayError::TransportUnavailable(e.to_string()))
}

/// Routes incoming frames: answers to their waiting caller, notifications
/// to the queue. Pending calls fail once this returns.
async fn read_loop(
    conn: Arc<ClientConnection>,
    pending: Pending,
    notifications: mpsc::UnboundedSender<String>,
) {
    let codec = JsonCodec;
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(conn = %conn.id(), error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(conn = %conn.id(), error = %e, "undecodable frame");
                continue;
            }
        };

        match envelope.payload {
            Payload::Notify { message } => {
                let _ = notifications.send(message);
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::debug!(conn = %conn.id(), %reason, "server disconnected");
                break;
            }
            payload => {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&envelope.seq);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(payload);
                    }
                    None => {
                        tracing::debug!(seq = envelope.seq, "unsolicited frame dropped");
                    }
                }
            }
        }
    }

    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
