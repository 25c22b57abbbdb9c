//! Mock backend for exercising the tunnel lifecycle in tests
//!
//! The mock records every configuration it is asked to bring up and can be
//! scripted to fail the next operation, which is enough to cover the
//! controller's failure paths without a real tunnel engine.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendState, TunnelBackend, TunnelHandle};
use crate::config::TunnelConfig;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockInner {
    state: BackendState,
    handles_created: u32,
    applied: Vec<TunnelConfig>,
    fail_create: Option<String>,
    fail_up: Option<String>,
    fail_down: Option<String>,
}

/// Scriptable in-memory backend.
#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Mutex<MockInner>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_handle` fail with `reason`
    pub fn fail_next_create(&self, reason: &str) {
        self.inner.lock().unwrap().fail_create = Some(reason.to_string());
    }

    /// Make the next transition to `Up` fail with `reason`
    pub fn fail_next_up(&self, reason: &str) {
        self.inner.lock().unwrap().fail_up = Some(reason.to_string());
    }

    /// Make the next transition to `Down` fail with `reason`
    pub fn fail_next_down(&self, reason: &str) {
        self.inner.lock().unwrap().fail_down = Some(reason.to_string());
    }

    /// Configurations the backend was asked to bring up, oldest first
    pub fn applied_configs(&self) -> Vec<TunnelConfig> {
        self.inner.lock().unwrap().applied.clone()
    }

    /// Current tunnel state
    pub fn state(&self) -> BackendState {
        self.inner.lock().unwrap().state
    }

    /// Number of handles handed out
    pub fn handles_created(&self) -> u32 {
        self.inner.lock().unwrap().handles_created
    }
}

#[async_trait]
impl TunnelBackend for MockBackend {
    async fn create_handle(&self) -> Result<TunnelHandle> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = inner.fail_create.take() {
            return Err(Error::Backend(reason));
        }
        let name = format!("wgmock{}", inner.handles_created);
        inner.handles_created += 1;
        Ok(TunnelHandle::new(name))
    }

    async fn set_state(
        &self,
        _handle: &TunnelHandle,
        target: BackendState,
        config: Option<&TunnelConfig>,
    ) -> Result<BackendState> {
        let mut inner = self.inner.lock().unwrap();
        match target {
            BackendState::Up => {
                if let Some(reason) = inner.fail_up.take() {
                    return Err(Error::Backend(reason));
                }
                let config =
                    config.ok_or_else(|| Error::Backend("target UP requires a configuration".into()))?;
                inner.applied.push(config.clone());
                inner.state = BackendState::Up;
            }
            BackendState::Down => {
                if let Some(reason) = inner.fail_down.take() {
                    return Err(Error::Backend(reason));
                }
                inner.state = BackendState::Down;
            }
        }
        Ok(inner.state)
    }

    async fn get_state(&self, _handle: &TunnelHandle) -> Result<BackendState> {
        Ok(self.inner.lock().unwrap().state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawTunnelPayload;
    use crate::key::Key;
    use serde_json::json;

    fn config() -> TunnelConfig {
        let payload = RawTunnelPayload {
            private_key: Some(Key::from_bytes([1u8; 32]).to_base64()),
            public_key: Some(Key::from_bytes([2u8; 32]).to_base64()),
            server_address: Some("203.0.113.5".to_string()),
            server_port: Some(51820),
            allowed_ips: Some(vec![json!("0.0.0.0/0")]),
            ..Default::default()
        };
        TunnelConfig::validate(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_up_requires_config() {
        let backend = MockBackend::new();
        let handle = backend.create_handle().await.unwrap();
        let result = backend.set_state(&handle, BackendState::Up, None).await;
        assert!(result.is_err());
        assert_eq!(backend.state(), BackendState::Down);
    }

    #[tokio::test]
    async fn test_up_down_cycle_and_capture() {
        let backend = MockBackend::new();
        let handle = backend.create_handle().await.unwrap();

        let state = backend
            .set_state(&handle, BackendState::Up, Some(&config()))
            .await
            .unwrap();
        assert_eq!(state, BackendState::Up);
        assert_eq!(backend.get_state(&handle).await.unwrap(), BackendState::Up);
        assert_eq!(backend.applied_configs().len(), 1);

        let state = backend
            .set_state(&handle, BackendState::Down, None)
            .await
            .unwrap();
        assert_eq!(state, BackendState::Down);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_one_shot() {
        let backend = MockBackend::new();
        let handle = backend.create_handle().await.unwrap();

        backend.fail_next_up("no route to host");
        let err = backend
            .set_state(&handle, BackendState::Up, Some(&config()))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Backend("no route to host".to_string()));
        assert_eq!(backend.state(), BackendState::Down);

        // The failure is consumed; the next attempt succeeds.
        backend
            .set_state(&handle, BackendState::Up, Some(&config()))
            .await
            .unwrap();
        assert_eq!(backend.state(), BackendState::Up);
    }
}
