//! Control socket for the caller-facing operation surface
//!
//! Single-line JSON requests and responses over a Unix domain socket, one
//! request per connection. This is how out-of-process callers (the CLI,
//! a host bridge) reach a running [`TunnelController`]. Every failure is
//! returned as a stable error code plus a human-readable detail string.

use serde::{Deserialize, Serialize};

use wg_tunnel::{RawTunnelPayload, TunnelState};

use crate::controller::{TunnelController, TunnelStatus};
use crate::error::Error;
use crate::permission::PermissionOutcome;

/// Default path for the control socket
#[cfg(unix)]
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/wglink.sock";

#[cfg(windows)]
pub const DEFAULT_SOCKET_PATH: &str = r"\\.\pipe\wglink";

/// Requests understood by the control socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Initialize the engine (checks and requests the VPN permission)
    Initialize,
    /// Trigger the host permission flow
    RequestPermission,
    /// Validate the payload and bring the tunnel up
    Connect { config: RawTunnelPayload },
    /// Tear the tunnel down
    Disconnect,
    /// Query current status (never fails)
    Status,
    /// Check whether tunnels are supported on this host
    IsSupported,
}

/// Responses from the control socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Success acknowledgment
    Ok,
    /// Permission flow outcome
    Permission { result: String },
    /// Status response
    Status(StatusInfo),
    /// Support query response
    Supported { supported: bool },
    /// Error with a stable code and a human-readable detail
    Error { code: String, message: String },
}

/// Status in the caller wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    /// Whether the tunnel is established
    pub is_connected: bool,
    /// "UP", "DOWN", "UNKNOWN" or "ERROR"
    pub tunnel_state: String,
    /// Failure diagnostic, present when the state is "ERROR"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the host has granted tunnel-creation privilege
    pub vpn_permission_granted: bool,
}

impl From<TunnelStatus> for StatusInfo {
    fn from(status: TunnelStatus) -> Self {
        Self {
            is_connected: status.is_connected,
            tunnel_state: state_label(status.state).to_string(),
            error: status.error,
            vpn_permission_granted: status.permission_granted,
        }
    }
}

/// Wire label for a lifecycle state
pub fn state_label(state: TunnelState) -> &'static str {
    match state {
        TunnelState::Up => "UP",
        TunnelState::Down => "DOWN",
        TunnelState::Failed => "ERROR",
        _ => "UNKNOWN",
    }
}

/// Dispatch a control request against a controller.
///
/// This is the whole caller-facing surface; the socket server below is
/// just line framing around it.
pub async fn dispatch(controller: &TunnelController, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Initialize => match controller.initialize().await {
            Ok(()) => ControlResponse::Ok,
            Err(e) => error_response("INIT_ERROR", e),
        },
        ControlRequest::RequestPermission => match controller.request_permission().await {
            Ok(PermissionOutcome::AlreadyGranted) => ControlResponse::Permission {
                result: "PERMISSION_ALREADY_GRANTED".to_string(),
            },
            Ok(PermissionOutcome::Requested) => ControlResponse::Permission {
                result: "PERMISSION_REQUESTED".to_string(),
            },
            Ok(PermissionOutcome::Unavailable) => {
                error_response("PERMISSION_ERROR", Error::NoInteractiveContext)
            }
            Err(e) => error_response("PERMISSION_ERROR", e),
        },
        ControlRequest::Connect { config } => match controller.connect(&config).await {
            Ok(()) => ControlResponse::Ok,
            Err(e) => error_response("CONNECT_ERROR", e),
        },
        ControlRequest::Disconnect => match controller.disconnect().await {
            Ok(()) => ControlResponse::Ok,
            Err(e) => error_response("DISCONNECT_ERROR", e),
        },
        ControlRequest::Status => ControlResponse::Status(controller.status().await.into()),
        ControlRequest::IsSupported => ControlResponse::Supported {
            supported: controller.is_supported(),
        },
    }
}

fn error_response(fallback: &'static str, error: Error) -> ControlResponse {
    ControlResponse::Error {
        code: error.permission_code().unwrap_or(fallback).to_string(),
        message: error.to_string(),
    }
}

#[cfg(unix)]
pub use socket::{ControlClient, ControlServer};

#[cfg(unix)]
mod socket {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{UnixListener, UnixStream};

    use super::{dispatch, ControlRequest, ControlResponse, StatusInfo};
    use crate::controller::TunnelController;
    use crate::error::{Error, Result};

    /// Serves the control surface for a running controller.
    pub struct ControlServer {
        socket_path: PathBuf,
        controller: Arc<TunnelController>,
    }

    impl ControlServer {
        pub fn new(socket_path: impl AsRef<Path>, controller: Arc<TunnelController>) -> Self {
            Self {
                socket_path: socket_path.as_ref().to_path_buf(),
                controller,
            }
        }

        /// Bind the socket and serve requests until the task is dropped.
        pub async fn start(&self) -> Result<()> {
            // Remove any stale socket file from a previous run.
            let _ = std::fs::remove_file(&self.socket_path);
            if let Some(parent) = self.socket_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }

            let listener = UnixListener::bind(&self.socket_path)?;

            // Owner read/write only; the socket accepts lifecycle commands.
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                let _ = std::fs::set_permissions(&self.socket_path, perms);
            }

            log::info!("control socket listening on {:?}", self.socket_path);

            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let controller = self.controller.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, controller).await {
                                log::debug!("control connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("control socket accept error: {}", e);
                    }
                }
            }
        }

        /// Remove the socket file
        pub fn cleanup(&self) {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }

    impl Drop for ControlServer {
        fn drop(&mut self) {
            self.cleanup();
        }
    }

    async fn handle_connection(
        stream: UnixStream,
        controller: Arc<TunnelController>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.is_empty() {
            return Ok(()); // client went away
        }

        let request: ControlRequest = serde_json::from_str(line.trim())?;
        let response = dispatch(&controller, request).await;

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;

        Ok(())
    }

    /// Client side of the control socket.
    pub struct ControlClient {
        socket_path: PathBuf,
    }

    impl ControlClient {
        pub fn new(socket_path: impl AsRef<Path>) -> Self {
            Self {
                socket_path: socket_path.as_ref().to_path_buf(),
            }
        }

        /// Send a request and wait for the response.
        pub async fn request(&self, request: ControlRequest) -> Result<ControlResponse> {
            let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
                Error::Control {
                    code: "NO_INSTANCE".to_string(),
                    message: format!(
                        "cannot connect to control socket at {:?}: {}. Is wglink running?",
                        self.socket_path, e
                    ),
                }
            })?;

            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);

            let mut payload = serde_json::to_string(&request)?;
            payload.push('\n');
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await?;

            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
                .await
                .map_err(|_| Error::Control {
                    code: "TIMEOUT".to_string(),
                    message: "timed out waiting for the control response".to_string(),
                })??;

            Ok(serde_json::from_str(line.trim())?)
        }

        /// Query status from the running instance
        pub async fn status(&self) -> Result<StatusInfo> {
            match self.request(ControlRequest::Status).await? {
                ControlResponse::Status(info) => Ok(info),
                ControlResponse::Error { code, message } => Err(Error::Control { code, message }),
                other => Err(Error::Control {
                    code: "PROTOCOL".to_string(),
                    message: format!("unexpected response to status request: {:?}", other),
                }),
            }
        }

        /// Ask the running instance to disconnect
        pub async fn disconnect(&self) -> Result<()> {
            match self.request(ControlRequest::Disconnect).await? {
                ControlResponse::Ok => Ok(()),
                ControlResponse::Error { code, message } => Err(Error::Control { code, message }),
                other => Err(Error::Control {
                    code: "PROTOCOL".to_string(),
                    message: format!("unexpected response to disconnect request: {:?}", other),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(state_label(TunnelState::Up), "UP");
        assert_eq!(state_label(TunnelState::Down), "DOWN");
        assert_eq!(state_label(TunnelState::Failed), "ERROR");
        assert_eq!(state_label(TunnelState::Uninitialized), "UNKNOWN");
        assert_eq!(state_label(TunnelState::AwaitingPermission), "UNKNOWN");
        assert_eq!(state_label(TunnelState::Connecting), "UNKNOWN");
        assert_eq!(state_label(TunnelState::Ready), "UNKNOWN");
    }

    #[test]
    fn test_request_wire_format() {
        let request: ControlRequest = serde_json::from_str(r#"{"type":"status"}"#).unwrap();
        assert!(matches!(request, ControlRequest::Status));

        let request: ControlRequest = serde_json::from_str(
            r#"{"type":"connect","config":{"privateKey":"x","allowedIPs":["0.0.0.0/0"]}}"#,
        )
        .unwrap();
        match request {
            ControlRequest::Connect { config } => {
                assert_eq!(config.private_key.as_deref(), Some("x"));
                assert_eq!(config.allowed_ips.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_status_wire_format() {
        let info = StatusInfo {
            is_connected: true,
            tunnel_state: "UP".to_string(),
            error: None,
            vpn_permission_granted: true,
        };
        let encoded = serde_json::to_string(&ControlResponse::Status(info)).unwrap();
        assert!(encoded.contains("\"isConnected\":true"));
        assert!(encoded.contains("\"tunnelState\":\"UP\""));
        assert!(encoded.contains("\"vpnPermissionGranted\":true"));
        // Absent error must not appear on the wire.
        assert!(!encoded.contains("\"error\""));
    }
}
