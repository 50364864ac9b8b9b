use serde::{Deserialize, Serialize};

/// Static facts about the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub cpu: String,
    /// Physical memory in bytes.
    pub memory: u64,
    pub os_distro: String,
    pub os_version: String,
    pub os_codename: String,
}

/// A package with a pending update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub package_name: String,
    pub arch: String,
    pub version: String,
    pub repository: String,
}

/// A block device or partition from the kernel's partition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// A package repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: String,
    pub repo_name: String,
    pub baseurl: String,
    pub is_mirror: bool,
    pub enabled: bool,
    pub gpgcheck: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpgkey: Option<String>,
}

/// A host device as the node-device listing reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    /// Nested capability of a SCSI host (`fc_host`, `vport_ops`), or empty.
    pub adapter_type: String,
    pub wwnn: String,
    pub wwpn: String,
    /// Top-level capability (`scsi_host`, `net`, ...). Used for filtering,
    /// not served.
    #[serde(skip)]
    pub capability: String,
}

impl Device {
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capability == cap || self.adapter_type == cap
    }
}
