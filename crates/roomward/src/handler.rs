//! Per-connection handler: handshake, call routing, notification push.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Ask the lobby whether the identity is already connected in its
//!      role; if not, register the connection there
//!   3. Send HandshakeAck
//!   4. Loop: route calls to rooms, push notifications, answer heartbeats

use std::collections::HashSet;
use std::sync::Arc;

use roomward_protocol::{
    Codec, Envelope, Identity, PROTOCOL_VERSION, Payload, ProtocolError,
    Role, RoomId, RoomRequest, SystemMessage,
};
use roomward_room::SubscriberHandle;
use roomward_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::RoomwardError;
use crate::gateway::rejection;
use crate::server::ServerState;

/// Drop guard that withdraws a connection from every room it touched.
///
/// `Drop` is synchronous, so the async cleanup runs in a spawned task.
struct ConnectionGuard<C: Codec + Send + Sync + 'static> {
    role: Role,
    identity: Identity,
    state: Arc<ServerState<C>>,
    /// Registrations made through this connection.
    registered: HashSet<(RoomId, Role, Identity)>,
    /// Applications made through this connection.
    applied: HashSet<(RoomId, Identity)>,
}

impl<C: Codec + Send + Sync + 'static> ConnectionGuard<C> {
    /// Remembers what a successful call left behind.
    fn track(&mut self, room_id: RoomId, request: &RoomRequest) {
        match *request {
            RoomRequest::Register { role, identity } => {
                self.registered.insert((room_id, role, identity));
            }
            RoomRequest::Disconnect { role, identity } => {
                self.registered.remove(&(room_id, role, identity));
            }
            RoomRequest::Apply { identity, .. }
            | RoomRequest::Reattach { identity } => {
                self.applied.insert((room_id, identity));
            }
            RoomRequest::Cancel { identity }
            | RoomRequest::EndUse { identity }
            | RoomRequest::GoOffline { identity } => {
                self.applied.remove(&(room_id, identity));
            }
            _ => {}
        }
    }
}

impl<C: Codec + Send + Sync + 'static> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let role = self.role;
        let identity = self.identity;
        let state = Arc::clone(&self.state);
        let registered = std::mem::take(&mut self.registered);
        let applied = std::mem::take(&mut self.applied);

        tokio::spawn(async move {
            let rooms = state.rooms.lock().await;

            if let Ok(lobby) = rooms.lobby() {
                let _ = lobby.disconnect(role, identity).await;
            }
            for (room_id, role, identity) in registered {
                if let Ok(handle) = rooms.get(room_id) {
                    let _ = handle.disconnect(role, identity).await;
                }
            }
            for (room_id, identity) in applied {
                if let Ok(handle) = rooms.get(room_id) {
                    if let Err(e) = handle.go_offline(identity).await {
                        tracing::debug!(%room_id, %identity, error = %e, "mark offline skipped");
                    }
                }
            }
            tracing::debug!(%role, %identity, "connection cleaned up");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RoomwardError>
where
    C: Codec + Send + Sync + 'static,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let (role, identity) = perform_handshake(&conn, &state).await?;

    // --- Step 2: Identity uniqueness ---
    // The manager lock is held across check and register so two
    // connections can't both claim the same identity.
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<String>();
    let callback: SubscriberHandle = Arc::new(notify_tx);
    {
        let rooms = state.rooms.lock().await;
        let lobby = rooms.lobby()?;
        if lobby.check(role, identity).await? {
            drop(rooms);
            send_error(
                &conn,
                &state.codec,
                409,
                &format!("{role} {identity} is already connected"),
                0,
            )
            .await?;
            return Err(RoomwardError::DuplicateIdentity { role, identity });
        }
        lobby.register(role, identity, Arc::clone(&callback)).await?;
    }
    let mut guard = ConnectionGuard {
        role,
        identity,
        state: Arc::clone(&state),
        registered: HashSet::new(),
        applied: HashSet::new(),
    };

    let ack = Envelope::system(0, SystemMessage::HandshakeAck { identity, role });
    send_envelope(&conn, &state.codec, &ack).await?;
    tracing::info!(%conn_id, %role, %identity, "connected");

    // --- Step 3: Message loop ---
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%identity, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%identity, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut()
                    .reset(tokio::time::Instant::now() + state.idle_timeout);

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%identity, error = %e, "failed to decode envelope");
                        send_error(&conn, &state.codec, 400, &e.to_string(), 0).await?;
                        continue;
                    }
                };

                let seq = envelope.seq;
                match envelope.payload {
                    Payload::System(msg) => {
                        if handle_system_message(&conn, &state, identity, seq, msg).await? {
                            break;
                        }
                    }
                    Payload::Call { room_id, request } => {
                        handle_call(&conn, &state, &mut guard, &callback, seq, room_id, request)
                            .await?;
                    }
                    Payload::Reply(_) | Payload::Notify { .. } => {
                        send_error(&conn, &state.codec, 400, "unexpected payload", seq).await?;
                    }
                }
            }

            Some(message) = notify_rx.recv() => {
                let push = Envelope::new(0, Payload::Notify { message });
                send_envelope(&conn, &state.codec, &push).await?;
            }

            () = &mut idle => {
                tracing::info!(%identity, "connection timed out");
                break;
            }
        }
    }

    // guard drops here → rooms are told this connection is gone.
    Ok(())
}

/// Receives the Handshake, validates it, and returns who is connecting.
async fn perform_handshake<C: Codec + Send + Sync + 'static>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
) -> Result<(Role, Identity), RoomwardError> {
    let data = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(RoomwardError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0).await?;
            return Err(e.into());
        }
    };

    let (version, role, identity) = match envelope.payload {
        Payload::System(SystemMessage::Handshake {
            version,
            role,
            identity,
        }) => (version, role, identity),
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0).await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            0,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    Ok((role, identity))
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<C: Codec + Send + Sync + 'static>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    identity: Identity,
    seq: u64,
    msg: SystemMessage,
) -> Result<bool, RoomwardError> {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let ack = Envelope::system(
                seq,
                SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: state.started.elapsed().as_millis() as u64,
                },
            );
            send_envelope(conn, &state.codec, &ack).await?;
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%identity, %reason, "client disconnected");
            return Ok(true);
        }

        _ => {
            tracing::debug!(%identity, "ignoring unexpected system message");
        }
    }

    Ok(false)
}

/// Routes a call to its room and answers under the call's `seq`.
async fn handle_call<C: Codec + Send + Sync + 'static>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    guard: &mut ConnectionGuard<C>,
    callback: &SubscriberHandle,
    seq: u64,
    room_id: RoomId,
    request: RoomRequest,
) -> Result<(), RoomwardError> {
    // Resolve under the lock, call without it.
    let handle = match state.rooms.lock().await.get(room_id) {
        Ok(handle) => handle,
        Err(e) => {
            return send_error(conn, &state.codec, 404, &e.to_string(), seq).await;
        }
    };

    let op = request.name();
    let tracked = request.clone();
    let reply = match handle.invoke(request, Some(Arc::clone(callback))).await {
        Ok(reply) => {
            guard.track(room_id, &tracked);
            reply
        }
        Err(e) => match rejection(&e) {
            Some(reply) => reply,
            None => {
                tracing::warn!(%room_id, op, error = %e, "room unreachable");
                return send_error(conn, &state.codec, 503, &e.to_string(), seq).await;
            }
        },
    };

    tracing::debug!(%room_id, op, ok = reply.is_ok(), "call answered");
    send_envelope(conn, &state.codec, &Envelope::new(seq, Payload::Reply(reply))).await
}

async fn send_envelope(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    envelope: &Envelope,
) -> Result<(), RoomwardError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes).await.map_err(RoomwardError::Transport)
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
) -> Result<(), RoomwardError> {
    send_envelope(conn, codec, &Envelope::error(seq, code, message)).await
}
