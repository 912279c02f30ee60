use crate::models::LockState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoorCommand {
    Lock,
    Unlock,
}

impl DoorCommand {
    pub fn for_state(state: LockState) -> Option<Self> {
        match state {
            LockState::Locked => Some(DoorCommand::Lock),
            LockState::Unlocked => Some(DoorCommand::Unlock),
            LockState::Unknown => None,
        }
    }
}

/// Confirmation from the door controller that the command took effect.
#[derive(Debug, Clone)]
pub struct DoorAck;

#[derive(Debug, Error)]
pub enum ControllerFault {
    /// Transient: the device did not answer. Retried only at the routine's
    /// next natural trigger, never in a loop.
    #[error("Device unreachable: {0}")]
    Unreachable(String),
    /// Terminal for this attempt: hardware fault or invalid command.
    #[error("Device rejected command: {0}")]
    Rejected(String),
}

/// Per-vendor door-controller sync seam. The wire protocol behind it is not
/// this service's concern.
#[async_trait]
pub trait DoorController: Send + Sync {
    async fn sync(&self, device_address: &str, command: DoorCommand)
        -> Result<DoorAck, ControllerFault>;
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    device_address: &'a str,
    command: DoorCommand,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SyncResponse {
    state: LockState,
}

/// Door controller reached over HTTP, one vendor endpoint per deployment.
pub struct HttpDoorController {
    client: reqwest::Client,
    sync_url: String,
}

impl HttpDoorController {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            sync_url: format!("{}/sync", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl DoorController for HttpDoorController {
    async fn sync(
        &self,
        device_address: &str,
        command: DoorCommand,
    ) -> Result<DoorAck, ControllerFault> {
        let response = self
            .client
            .post(&self.sync_url)
            .json(&SyncRequest {
                device_address,
                command,
            })
            .send()
            .await
            .map_err(|e| ControllerFault::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ControllerFault::Rejected(format!(
                "Controller returned {}",
                response.status()
            )));
        }

        response
            .json::<SyncResponse>()
            .await
            .map_err(|e| ControllerFault::Rejected(format!("Malformed controller reply: {}", e)))?;

        Ok(DoorAck)
    }
}
