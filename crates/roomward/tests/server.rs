//! Integration tests for the Roomward server, handler, and gateways.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomward::prelude::*;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    addr: String,
    room: RoomId,
}

/// Starts a server hosting one room of capacity 10 on a random port.
async fn start_server() -> TestServer {
    start_server_with(RoomwardServer::builder()).await
}

async fn start_server_with(builder: RoomwardServerBuilder) -> TestServer {
    let server = builder
        .bind("127.0.0.1:0")
        .room(RoomConfig::new("seminar", 10))
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let room = server.room_ids().await[0];

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer { addr, room }
}

async fn connect_raw(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

async fn recv_json(ws: &mut ClientWs) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("should receive within timeout")
        .expect("stream should not end")
        .expect("should not error");
    let text = match msg {
        Message::Text(t) => t.as_str().to_string(),
        Message::Binary(b) => String::from_utf8(b.to_vec()).expect("utf8"),
        other => panic!("unexpected frame: {other:?}"),
    };
    serde_json::from_str(&text).expect("valid json")
}

fn handshake(version: u32, role: &str, identity: u64) -> serde_json::Value {
    json!({
        "seq": 0,
        "payload": {
            "type": "System",
            "data": { "type": "Handshake", "version": version, "role": role, "identity": identity }
        }
    })
}

async fn client(server: &TestServer, role: Role, identity: u64) -> GatewayClient {
    GatewayClient::connect(&server.addr, role, Identity(identity))
        .await
        .expect("client should connect")
}

/// Waits for a notification containing `needle`, skipping others.
async fn expect_notification(client: &GatewayClient, needle: &str) -> String {
    let wait = async {
        while let Some(message) = client.next_notification().await {
            if message.contains(needle) {
                return message;
            }
        }
        panic!("connection closed before {needle:?} arrived");
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"))
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_valid_returns_ack() {
    let server = start_server().await;
    let mut ws = connect_raw(&server.addr).await;

    send_json(&mut ws, handshake(1, "cleaner", 50)).await;
    let ack = recv_json(&mut ws).await;

    assert_eq!(ack["payload"]["type"], "System");
    assert_eq!(ack["payload"]["data"]["type"], "HandshakeAck");
    assert_eq!(ack["payload"]["data"]["identity"], 50);
    assert_eq!(ack["payload"]["data"]["role"], "cleaner");
}

#[tokio::test]
async fn test_handshake_wrong_version_returns_400() {
    let server = start_server().await;
    let mut ws = connect_raw(&server.addr).await;

    send_json(&mut ws, handshake(99, "cleaner", 50)).await;
    let reply = recv_json(&mut ws).await;

    assert_eq!(reply["payload"]["data"]["type"], "Error");
    assert_eq!(reply["payload"]["data"]["code"], 400);
}

#[tokio::test]
async fn test_handshake_not_first_returns_400() {
    let server = start_server().await;
    let mut ws = connect_raw(&server.addr).await;

    send_json(
        &mut ws,
        json!({"seq": 1, "payload": {"type": "Call", "data": {"room_id": 1, "request": {"op": "Status"}}}}),
    )
    .await;
    let reply = recv_json(&mut ws).await;

    assert_eq!(reply["payload"]["data"]["code"], 400);
}

#[tokio::test]
async fn test_connect_duplicate_identity_returns_409() {
    let server = start_server().await;
    let _first = client(&server, Role::Approver, 20).await;

    let second = GatewayClient::connect(&server.addr, Role::Approver, Identity(20)).await;

    assert!(matches!(second, Err(GatewayError::Refused { code: 409, .. })));
}

#[tokio::test]
async fn test_connect_same_identity_other_role_is_accepted() {
    let server = start_server().await;
    let _approver = client(&server, Role::Approver, 20).await;
    let cleaner = GatewayClient::connect(&server.addr, Role::Cleaner, Identity(20)).await;
    assert!(cleaner.is_ok());
}

#[tokio::test]
async fn test_connect_after_close_frees_identity() {
    let server = start_server().await;
    let first = client(&server, Role::Cleaner, 50).await;
    first.close().await.expect("close");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let again = GatewayClient::connect(&server.addr, Role::Cleaner, Identity(50)).await;
    assert!(again.is_ok(), "identity should be free again: {again:?}");
}

#[tokio::test]
async fn test_connect_no_server_is_transport_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = GatewayClient::connect(&addr, Role::Applicant, Identity(1)).await;

    assert!(matches!(result, Err(GatewayError::TransportUnavailable(_))));
}

// =========================================================================
// Calls
// =========================================================================

#[tokio::test]
async fn test_invoke_unknown_room_is_refused_404() {
    let server = start_server().await;
    let applicant = client(&server, Role::Applicant, 1).await;

    let result = applicant.invoke(RoomId(999_999), RoomRequest::Status).await;

    assert!(matches!(result, Err(GatewayError::Refused { code: 404, .. })));
}

#[tokio::test]
async fn test_invoke_status_returns_snapshot() {
    let server = start_server().await;
    let applicant = client(&server, Role::Applicant, 1).await;

    let reply = applicant.invoke(server.room, RoomRequest::Status).await.unwrap();

    let Reply::Status(status) = reply else {
        panic!("expected status");
    };
    assert_eq!(status.name, "seminar");
    assert_eq!(status.condition, "CLEAN_EMPTY");
}

#[tokio::test]
async fn test_invoke_over_capacity_is_rejected_not_an_error() {
    let server = start_server().await;
    let applicant = client(&server, Role::Applicant, 1).await;

    let reply = applicant
        .invoke(
            server.room,
            RoomRequest::Apply {
                identity: Identity(1),
                headcount: 15,
            },
        )
        .await
        .expect("rejections are replies");

    assert!(matches!(
        reply,
        Reply::Rejected {
            reason: RejectReason::CapacityExceeded,
            ..
        }
    ));
    expect_notification(&applicant, "refused").await;
}

#[tokio::test]
async fn test_invoke_repair_on_clean_room_is_illegal_transition() {
    let server = start_server().await;
    let maintainer = client(&server, Role::Maintainer, 40).await;

    let reply = maintainer
        .invoke(server.room, RoomRequest::RepairComplete { identity: Identity(40) })
        .await
        .unwrap();

    assert!(matches!(
        reply,
        Reply::Rejected {
            reason: RejectReason::IllegalTransition,
            ..
        }
    ));
}

#[tokio::test]
async fn test_heartbeat_returns_server_time() {
    let server = start_server().await;
    let cleaner = client(&server, Role::Cleaner, 50).await;
    assert!(cleaner.heartbeat().await.is_ok());
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let server = start_server_with(
        RoomwardServer::builder().idle_timeout(Duration::from_millis(100)),
    )
    .await;
    let mut ws = connect_raw(&server.addr).await;
    send_json(&mut ws, handshake(1, "cleaner", 50)).await;
    let _ack = recv_json(&mut ws).await;

    let end = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;

    assert!(end.is_ok(), "server should drop an idle connection");
}

// =========================================================================
// Full flow over the network
// =========================================================================

#[tokio::test]
async fn test_full_cycle_over_network() {
    let server = start_server().await;
    let room = server.room;

    let first = client(&server, Role::Applicant, 1).await;
    let second = client(&server, Role::Applicant, 2).await;
    let approver = client(&server, Role::Approver, 20).await;
    let cleaner = client(&server, Role::Cleaner, 50).await;

    for (who, role, identity) in [(&approver, Role::Approver, 20), (&cleaner, Role::Cleaner, 50)] {
        let reply = who
            .invoke(room, RoomRequest::Register { role, identity: Identity(identity) })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Registered { already_present: false });
    }

    // Applicant 1 applies and is approved into a clean room.
    let reply = first
        .invoke(room, RoomRequest::Apply { identity: Identity(1), headcount: 4 })
        .await
        .unwrap();
    assert!(reply.is_ok());
    expect_notification(&approver, "#1 applied for 4").await;

    approver.invoke(room, RoomRequest::Approve { identity: Identity(1) }).await.unwrap();
    expect_notification(&first, "the room is yours").await;
    expect_notification(&cleaner, "is OCCUPIED").await;

    // Applicant 2 is approved while the room is occupied: reserved.
    second
        .invoke(room, RoomRequest::Apply { identity: Identity(2), headcount: 2 })
        .await
        .unwrap();
    approver.invoke(room, RoomRequest::Approve { identity: Identity(2) }).await.unwrap();
    expect_notification(&second, "reserved").await;

    // 1 leaves, the cleaner cleans, 2 moves in.
    first.invoke(room, RoomRequest::EndUse { identity: Identity(1) }).await.unwrap();
    expect_notification(&cleaner, "needs cleaning").await;
    cleaner
        .invoke(room, RoomRequest::CleanComplete { identity: Identity(50) })
        .await
        .unwrap();
    expect_notification(&second, "ready for you").await;

    let Reply::Status(status) = approver.invoke(room, RoomRequest::Status).await.unwrap() else {
        panic!("expected status");
    };
    assert_eq!(status.condition, "OCCUPIED");
    assert_eq!(status.occupant, Some(Identity(2)));
    assert_eq!(status.reserved, None);
}

#[tokio::test]
async fn test_disconnect_marks_applications_offline() {
    let server = start_server().await;
    let room = server.room;
    let applicant = client(&server, Role::Applicant, 1).await;
    applicant
        .invoke(room, RoomRequest::Apply { identity: Identity(1), headcount: 2 })
        .await
        .unwrap();
    drop(applicant);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The application survives; a new connection can reattach to it.
    let back = client(&server, Role::Applicant, 1).await;
    let reply = back
        .invoke(room, RoomRequest::Reattach { identity: Identity(1) })
        .await
        .unwrap();
    assert!(reply.is_ok());
    expect_notification(&back, "welcome back").await;
}

// =========================================================================
// LocalGateway
// =========================================================================

#[tokio::test]
async fn test_local_gateway_matches_remote_semantics() {
    let rooms = Arc::new(tokio::sync::Mutex::new(RoomManager::new()));
    let room = rooms.lock().await.create_room(RoomConfig::new("local", 10));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let gateway = LocalGateway::new(Arc::clone(&rooms)).with_callback(Arc::new(tx));

    let reply = gateway
        .invoke(room, RoomRequest::Apply { identity: Identity(1), headcount: 4 })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Done);
    let reply = gateway
        .invoke(room, RoomRequest::Apply { identity: Identity(1), headcount: 4 })
        .await
        .unwrap();
    assert!(matches!(
        reply,
        Reply::Rejected {
            reason: RejectReason::AlreadyApplied,
            ..
        }
    ));

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(received.contains("application for 4 received"));

    let missing = gateway.invoke(RoomId(999_999), RoomRequest::Status).await;
    assert!(matches!(missing, Err(GatewayError::Refused { code: 404, .. })));
}
