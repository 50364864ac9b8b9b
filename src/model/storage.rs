use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Dir,
    Netfs,
    Logical,
}

impl FromStr for PoolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dir" => Ok(Self::Dir),
            "netfs" => Ok(Self::Netfs),
            "logical" => Ok(Self::Logical),
            other => Err(format!("unsupported pool type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Active,
    Inactive,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        })
    }
}

/// A storage pool and the volumes it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePool {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub state: PoolState,
    pub autostart: bool,
    #[serde(skip)]
    pub volumes: BTreeMap<String, StorageVolume>,
}

impl StoragePool {
    /// New pools start inactive; only directory pools autostart.
    pub fn new(name: impl Into<String>, path: impl Into<String>, pool_type: PoolType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            pool_type,
            state: PoolState::Inactive,
            autostart: pool_type == PoolType::Dir,
            volumes: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == PoolState::Active
    }
}

/// A volume inside a pool. Sizes are in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageVolume {
    pub name: String,
    pub path: String,
    pub capacity: u64,
    pub allocation: u64,
    pub format: String,
}
