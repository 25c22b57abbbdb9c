//! Lifecycle integration tests
//!
//! Exercise the controller end-to-end over the mock backend and a
//! scriptable permission broker: permission gating, the happy path,
//! backend faults and recovery, and the control surface's error codes.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use wg_tunnel::backend::mock::MockBackend;
use wg_tunnel::{BackendState, Key, RawTunnelPayload, TunnelSession, TunnelState};
use wglink_engine::{
    dispatch, ControlRequest, ControlResponse, Error, PermissionBroker, PermissionOutcome,
    PermissionRequest, TunnelController,
};

/// Broker whose grant state is flipped by the test.
struct ScriptedBroker {
    granted: Mutex<bool>,
    interactive: bool,
}

impl ScriptedBroker {
    fn new(granted: bool, interactive: bool) -> Self {
        Self {
            granted: Mutex::new(granted),
            interactive,
        }
    }

    fn grant(&self) {
        *self.granted.lock().unwrap() = true;
    }
}

#[async_trait]
impl PermissionBroker for ScriptedBroker {
    async fn prepare(&self) -> wglink_engine::Result<Option<PermissionRequest>> {
        if *self.granted.lock().unwrap() {
            Ok(None)
        } else {
            Ok(Some(PermissionRequest::new("create a VPN tunnel")))
        }
    }

    async fn present(&self, _request: PermissionRequest) -> wglink_engine::Result<()> {
        if self.interactive {
            Ok(())
        } else {
            Err(Error::NoInteractiveContext)
        }
    }
}

fn payload(port: i64) -> RawTunnelPayload {
    serde_json::from_value(json!({
        "privateKey": Key::from_bytes([1u8; 32]).to_base64(),
        "publicKey": Key::from_bytes([2u8; 32]).to_base64(),
        "serverAddress": "203.0.113.5",
        "serverPort": port,
        "allowedIPs": ["0.0.0.0/0"],
    }))
    .unwrap()
}

struct Harness {
    controller: TunnelController,
    backend: Arc<MockBackend>,
    broker: Arc<ScriptedBroker>,
}

fn harness(granted: bool, interactive: bool) -> Harness {
    let backend = Arc::new(MockBackend::new());
    let broker = Arc::new(ScriptedBroker::new(granted, interactive));
    let controller = TunnelController::new(TunnelSession::new(), backend.clone(), broker.clone());
    Harness {
        controller,
        backend,
        broker,
    }
}

#[tokio::test]
async fn connect_before_permission_is_refused() {
    let h = harness(false, true);

    let err = h.controller.connect(&payload(51820)).await.unwrap_err();
    assert!(matches!(err, Error::PermissionRequired));

    // The refusal leaves the session untouched and the backend idle.
    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Uninitialized);
    assert!(!status.is_connected);
    assert!(h.backend.applied_configs().is_empty());
}

#[tokio::test]
async fn initialize_without_permission_parks_awaiting() {
    let h = harness(false, true);

    let err = h.controller.initialize().await.unwrap_err();
    assert!(matches!(err, Error::PermissionRequired));

    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::AwaitingPermission);
    assert!(!status.permission_granted);

    // The grant arrives later as a discrete message.
    h.broker.grant();
    h.controller.permission_granted().await;

    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Ready);
    assert!(status.permission_granted);
}

#[tokio::test]
async fn initialize_without_interactive_context() {
    let h = harness(false, false);

    let err = h.controller.initialize().await.unwrap_err();
    assert!(matches!(err, Error::NoInteractiveContext));

    // Nothing was mutated.
    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Uninitialized);
}

#[tokio::test]
async fn full_lifecycle() {
    let h = harness(true, true);

    h.controller.initialize().await.unwrap();
    assert_eq!(h.controller.state().await, TunnelState::Ready);

    h.controller.connect(&payload(51820)).await.unwrap();
    let status = h.controller.status().await;
    assert!(status.is_connected);
    assert_eq!(status.state, TunnelState::Up);
    assert_eq!(h.backend.state(), BackendState::Up);

    // Defaults made it through to the backend.
    let applied = h.backend.applied_configs();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].mtu, 1280);
    assert_eq!(applied[0].peer.keepalive_interval, 25);

    h.controller.disconnect().await.unwrap();
    let status = h.controller.status().await;
    assert!(!status.is_connected);
    assert_eq!(status.state, TunnelState::Down);
    assert_eq!(h.backend.state(), BackendState::Down);
}

#[tokio::test]
async fn disconnect_without_connect_reports_not_connected() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();

    let err = h.controller.disconnect().await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    // The refusal does not alter the permission grant.
    let status = h.controller.status().await;
    assert!(status.permission_granted);
    assert_eq!(status.state, TunnelState::Ready);
}

#[tokio::test]
async fn connect_without_initialize_is_a_state_error() {
    let h = harness(true, true);

    // Permission is held, but the session was never initialized.
    h.controller.permission_granted().await;
    let err = h.controller.connect(&payload(51820)).await.unwrap_err();
    assert!(matches!(err, Error::State(_)));
}

#[tokio::test]
async fn backend_fault_fails_the_session() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();

    h.backend.fail_next_up("handshake timed out");
    let err = h.controller.connect(&payload(51820)).await.unwrap_err();
    match &err {
        Error::Backend(detail) => assert!(detail.contains("handshake timed out")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_recoverable());

    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Failed);
    assert!(status.error.as_deref().unwrap().contains("handshake timed out"));

    // Failed is not connectable; only a fresh initialize recovers.
    let err = h.controller.connect(&payload(51820)).await.unwrap_err();
    assert!(matches!(err, Error::State(_)));

    h.controller.initialize().await.unwrap();
    h.controller.connect(&payload(51820)).await.unwrap();
    assert_eq!(h.controller.state().await, TunnelState::Up);
}

#[tokio::test]
async fn reconnect_replaces_the_running_tunnel() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();

    h.controller.connect(&payload(51820)).await.unwrap();
    h.controller.connect(&payload(51821)).await.unwrap();

    // Last write wins: both configs reached the backend, the second one is
    // current.
    let applied = h.backend.applied_configs();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0].peer.endpoint_port, 51820);
    assert_eq!(applied[1].peer.endpoint_port, 51821);

    let current = h.controller.current_config().await.unwrap();
    assert_eq!(current.peer.endpoint_port, 51821);
    assert_eq!(h.controller.state().await, TunnelState::Up);
}

#[tokio::test]
async fn backend_down_notification_takes_session_down() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();
    h.controller.connect(&payload(51820)).await.unwrap();

    h.controller.backend_state_changed(BackendState::Down).await;
    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Down);
    assert!(!status.is_connected);
}

#[tokio::test]
async fn teardown_resets_to_uninitialized() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();
    h.controller.connect(&payload(51820)).await.unwrap();

    h.controller.teardown().await;
    let status = h.controller.status().await;
    assert_eq!(status.state, TunnelState::Uninitialized);
    assert!(!status.permission_granted);
    assert_eq!(h.backend.state(), BackendState::Down);
}

#[tokio::test]
async fn request_permission_flow() {
    let h = harness(false, true);

    let outcome = h.controller.request_permission().await.unwrap();
    assert_eq!(outcome, PermissionOutcome::Requested);
    assert!(!h.controller.status().await.permission_granted);

    h.broker.grant();
    let outcome = h.controller.request_permission().await.unwrap();
    assert_eq!(outcome, PermissionOutcome::AlreadyGranted);
    assert!(h.controller.status().await.permission_granted);
}

#[tokio::test]
async fn dispatch_maps_stable_error_codes() {
    let h = harness(false, true);

    // Initialize without a grant: the permission code wins over the
    // operation fallback.
    match dispatch(&h.controller, ControlRequest::Initialize).await {
        ControlResponse::Error { code, .. } => assert_eq!(code, "VPN_PERMISSION_REQUIRED"),
        other => panic!("unexpected response: {:?}", other),
    }

    // Disconnect with nothing connected.
    match dispatch(&h.controller, ControlRequest::Disconnect).await {
        ControlResponse::Error { code, message } => {
            assert_eq!(code, "DISCONNECT_ERROR");
            assert!(message.contains("no tunnel is connected"));
        }
        other => panic!("unexpected response: {:?}", other),
    }

    // A malformed payload surfaces as CONNECT_ERROR with the validation
    // detail.
    h.broker.grant();
    h.controller.initialize().await.unwrap();
    let mut bad = payload(51820);
    bad.server_port = Some(70000);
    match dispatch(&h.controller, ControlRequest::Connect { config: bad }).await {
        ControlResponse::Error { code, message } => {
            assert_eq!(code, "CONNECT_ERROR");
            assert!(message.contains("serverPort"));
            assert!(message.contains("70000"));
        }
        other => panic!("unexpected response: {:?}", other),
    }

    match dispatch(&h.controller, ControlRequest::IsSupported).await {
        ControlResponse::Supported { supported } => assert!(supported),
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn dispatch_no_activity_code() {
    let h = harness(false, false);

    match dispatch(&h.controller, ControlRequest::RequestPermission).await {
        ControlResponse::Error { code, .. } => assert_eq!(code, "NO_ACTIVITY"),
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn dispatch_permission_results() {
    let h = harness(false, true);

    match dispatch(&h.controller, ControlRequest::RequestPermission).await {
        ControlResponse::Permission { result } => assert_eq!(result, "PERMISSION_REQUESTED"),
        other => panic!("unexpected response: {:?}", other),
    }

    h.broker.grant();
    match dispatch(&h.controller, ControlRequest::RequestPermission).await {
        ControlResponse::Permission { result } => {
            assert_eq!(result, "PERMISSION_ALREADY_GRANTED")
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn status_degrades_failures_into_data() {
    let h = harness(true, true);
    h.controller.initialize().await.unwrap();
    h.backend.fail_next_up("device busy");
    let _ = h.controller.connect(&payload(51820)).await;

    // Status itself never fails; the fault shows up as data.
    match dispatch(&h.controller, ControlRequest::Status).await {
        ControlResponse::Status(info) => {
            assert_eq!(info.tunnel_state, "ERROR");
            assert!(!info.is_connected);
            assert!(info.error.unwrap().contains("device busy"));
        }
        other => panic!("unexpected response: {:?}", other),
    }
}
