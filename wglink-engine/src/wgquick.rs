//! `wg-quick` backend adapter
//!
//! The actual handshake and packet forwarding are owned by the system's
//! WireGuard tooling. This adapter renders the validated configuration in
//! the `wg-quick` format and shells out to bring the interface up or down.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use wg_tunnel::{BackendState, Error, Result, TunnelBackend, TunnelConfig, TunnelHandle};

/// Default interface name for the single managed tunnel
pub const DEFAULT_INTERFACE: &str = "wglink0";

/// Backend that drives the system `wg-quick` and `wg` commands.
pub struct WgQuickBackend {
    interface: String,
    config_dir: PathBuf,
}

impl WgQuickBackend {
    pub fn new(interface: impl Into<String>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Backend managing [`DEFAULT_INTERFACE`] with its config under the
    /// system temp directory.
    pub fn default_paths() -> Self {
        Self::new(DEFAULT_INTERFACE, std::env::temp_dir().join("wglink"))
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    async fn wg_quick(&self, action: &str, path: &Path) -> Result<()> {
        let output = Command::new("wg-quick")
            .arg(action)
            .arg(path)
            .output()
            .await
            .map_err(|e| Error::Backend(format!("failed to run wg-quick {}: {}", action, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Backend(format!(
                "wg-quick {} failed ({}): {}",
                action,
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl TunnelBackend for WgQuickBackend {
    async fn create_handle(&self) -> Result<TunnelHandle> {
        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .map_err(|e| {
                Error::Backend(format!(
                    "cannot create config directory {:?}: {}",
                    self.config_dir, e
                ))
            })?;
        Ok(TunnelHandle::new(self.interface.clone()))
    }

    async fn set_state(
        &self,
        _handle: &TunnelHandle,
        target: BackendState,
        config: Option<&TunnelConfig>,
    ) -> Result<BackendState> {
        let path = self.config_path();
        match target {
            BackendState::Up => {
                let config = config
                    .ok_or_else(|| Error::Backend("target UP requires a configuration".into()))?;

                tokio::fs::write(&path, render_quick_config(config))
                    .await
                    .map_err(|e| Error::Backend(format!("cannot write {:?}: {}", path, e)))?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o600);
                    let _ = std::fs::set_permissions(&path, perms);
                }

                // wg-quick refuses to start an interface twice; replace any
                // running instance.
                let _ = self.wg_quick("down", &path).await;
                self.wg_quick("up", &path).await?;
                Ok(BackendState::Up)
            }
            BackendState::Down => {
                self.wg_quick("down", &path).await?;
                Ok(BackendState::Down)
            }
        }
    }

    async fn get_state(&self, handle: &TunnelHandle) -> Result<BackendState> {
        let output = Command::new("wg")
            .arg("show")
            .arg(handle.name())
            .output()
            .await
            .map_err(|e| Error::Backend(format!("failed to run wg show: {}", e)))?;

        if output.status.success() {
            Ok(BackendState::Up)
        } else {
            Ok(BackendState::Down)
        }
    }

    fn supported(&self) -> bool {
        // wg-quick is a shell script; there is no Windows rendition.
        cfg!(unix)
    }
}

/// Render `config` in the `wg-quick` configuration format.
pub fn render_quick_config(config: &TunnelConfig) -> String {
    let mut out = String::new();

    out.push_str("[Interface]\n");
    out.push_str(&format!("PrivateKey = {}\n", config.private_key.to_base64()));
    out.push_str(&format!("Address = {}\n", join(&config.addresses)));
    if !config.dns_servers.is_empty() {
        out.push_str(&format!("DNS = {}\n", join(&config.dns_servers)));
    }
    out.push_str(&format!("MTU = {}\n", config.mtu));

    out.push_str("\n[Peer]\n");
    out.push_str(&format!(
        "PublicKey = {}\n",
        config.peer.public_key.to_base64()
    ));
    if let Some(preshared) = &config.peer.preshared_key {
        out.push_str(&format!("PresharedKey = {}\n", preshared.to_base64()));
    }
    out.push_str(&format!(
        "AllowedIPs = {}\n",
        join(&config.peer.allowed_routes)
    ));
    out.push_str(&format!(
        "Endpoint = {}:{}\n",
        config.peer.endpoint_host, config.peer.endpoint_port
    ));
    out.push_str(&format!(
        "PersistentKeepalive = {}\n",
        config.peer.keepalive_interval
    ));

    out
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
