use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Nat,
    Bridge,
    Isolated,
}

impl FromStr for Connection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nat" => Ok(Self::Nat),
            "bridge" => Ok(Self::Bridge),
            "isolated" => Ok(Self::Isolated),
            other => Err(format!("unsupported connection type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub connection: Connection,
    /// CIDR, e.g. `192.168.122.0/24`. Empty for bridged networks.
    pub subnet: String,
    /// Host interface a bridged network attaches to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub state: NetworkState,
    pub autostart: bool,
    pub vms: Vec<String>,
}
