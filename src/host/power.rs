//! Powering the host off or restarting it.
//!
//! The `/host` backend only decides whether a request is allowed; the
//! [`HostPower`] implementation carries it out. [`SystemPower`] runs the
//! system's `shutdown` command. [`RecordingPower`] only remembers what it was
//! asked, which is what tests and dry runs use.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use resource_framework::ModelError;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Reboot,
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
        })
    }
}

#[async_trait]
pub trait HostPower: Send + Sync {
    async fn request(&self, action: PowerAction) -> Result<(), ModelError>;
}

/// Runs `shutdown -h now` or `shutdown -r now`.
#[derive(Debug, Default)]
pub struct SystemPower;

#[async_trait]
impl HostPower for SystemPower {
    async fn request(&self, action: PowerAction) -> Result<(), ModelError> {
        let flag = match action {
            PowerAction::Shutdown => "-h",
            PowerAction::Reboot => "-r",
        };
        info!(%action, "Host is going down");
        let output = Command::new("shutdown")
            .args([flag, "now"])
            .output()
            .await
            .map_err(|e| ModelError::OperationFailed(format!("cannot run shutdown: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(ModelError::OperationFailed(if stderr.is_empty() {
                format!("host {action} failed with {}", output.status)
            } else {
                format!("host {action} failed: {stderr}")
            }));
        }
        Ok(())
    }
}

/// Accepts every request and keeps a log of them.
#[derive(Debug, Default)]
pub struct RecordingPower {
    requests: Mutex<Vec<PowerAction>>,
}

impl RecordingPower {
    pub fn requests(&self) -> Vec<PowerAction> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HostPower for RecordingPower {
    async fn request(&self, action: PowerAction) -> Result<(), ModelError> {
        info!(%action, "Host power request recorded");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
        Ok(())
    }
}
