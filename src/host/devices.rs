//! `/host/devices`: SCSI hosts and network interfaces.
//!
//! `GET /host/devices?_cap=fc_host` lists only Fibre Channel adapters. A
//! device matches a capability through its own kind (`scsi_host`, `net`) or
//! through its adapter type, so FC adapters answer to both `scsi_host` and
//! `fc_host`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::to_json;
use resource_framework::{
    CollectionModel, Flags, Listable, Lookupable, ModelError, ResourceModel,
};
use serde_json::Value;
use tracing::debug;

use crate::model::Device;

pub trait DeviceSource: Send + Sync {
    fn devices(&self) -> Result<Vec<Device>, ModelError>;
}

/// Reads `/sys/class/{scsi_host,fc_host,net}`.
#[derive(Debug, Clone)]
pub struct SysfsDevices {
    root: PathBuf,
}

impl Default for SysfsDevices {
    fn default() -> Self {
        Self::from_root("/sys/class")
    }
}

impl SysfsDevices {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scsi_host(&self, host: &str) -> Device {
        let fc = self.root.join("fc_host").join(host);
        let (adapter_type, wwnn, wwpn) = if fc.is_dir() {
            (
                "fc_host".to_string(),
                read_wwn(&fc.join("node_name")),
                read_wwn(&fc.join("port_name")),
            )
        } else {
            Default::default()
        };
        Device {
            name: format!("scsi_{host}"),
            adapter_type,
            wwnn,
            wwpn,
            capability: "scsi_host".to_string(),
        }
    }
}

impl DeviceSource for SysfsDevices {
    fn devices(&self) -> Result<Vec<Device>, ModelError> {
        let mut devices: Vec<Device> = entries(&self.root.join("scsi_host"))?
            .iter()
            .map(|host| self.scsi_host(host))
            .collect();
        devices.extend(
            entries(&self.root.join("net"))?
                .into_iter()
                .map(|iface| Device {
                    name: format!("net_{iface}"),
                    adapter_type: String::new(),
                    wwnn: String::new(),
                    wwpn: String::new(),
                    capability: "net".to_string(),
                }),
        );
        Ok(devices)
    }
}

/// Entry names of a class directory. A missing class has no devices.
fn entries(dir: &Path) -> Result<Vec<String>, ModelError> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ModelError::OperationFailed(format!(
                "cannot read {}: {e}",
                dir.display()
            )))
        }
    };
    let mut names: Vec<String> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// `0x20000000c9a1b2c3` as `20000000c9a1b2c3`; empty when unreadable.
fn read_wwn(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => {
            let text = text.trim();
            text.strip_prefix("0x").unwrap_or(text).to_string()
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No WWN");
            String::new()
        }
    }
}

/// A fixed device list.
#[derive(Debug, Default)]
pub struct StaticDevices(Vec<Device>);

impl StaticDevices {
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        Self(devices.into_iter().collect())
    }
}

impl DeviceSource for StaticDevices {
    fn devices(&self) -> Result<Vec<Device>, ModelError> {
        Ok(self.0.clone())
    }
}

pub struct DevicesModel {
    source: Arc<dyn DeviceSource>,
}

impl DevicesModel {
    pub fn new(source: Arc<dyn DeviceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Listable for DevicesModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.source.devices()?.into_iter().map(|d| d.name).collect())
    }

    async fn get_list_flagged(
        &self,
        _parent: &[String],
        flags: &Flags,
    ) -> Result<Vec<String>, ModelError> {
        let cap = flags.get("cap");
        Ok(self
            .source
            .devices()?
            .into_iter()
            .filter(|d| cap.map_or(true, |cap| d.has_capability(cap)))
            .map(|d| d.name)
            .collect())
    }
}

impl CollectionModel for DevicesModel {
    fn kind(&self) -> &'static str {
        "devices"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }
}

pub struct DeviceModel {
    source: Arc<dyn DeviceSource>,
}

impl DeviceModel {
    pub fn new(source: Arc<dyn DeviceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Lookupable for DeviceModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        let [name] = ident else {
            return Err(ModelError::NotFound("device not found".into()));
        };
        let device = self
            .source
            .devices()?
            .into_iter()
            .find(|d| &d.name == name)
            .ok_or_else(|| ModelError::NotFound(format!("device '{name}' not found")))?;
        to_json(&device)
    }
}

impl ResourceModel for DeviceModel {
    fn kind(&self) -> &'static str {
        "device"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }
}
