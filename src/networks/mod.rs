//! # Networks
//!
//! `/networks` and `/networks/<name>`. NAT and isolated networks get a
//! private `/24` when the client leaves `subnet` out; bridged networks attach
//! to a host `interface` instead and carry no subnet.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::{optional_str, required_str, to_json};
use resource_framework::{
    ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable, Listable,
    Lookupable, ModelError, Params, ResourceModel,
};
use serde_json::Value;
use tracing::info;

use crate::inventory::Inventory;
use crate::model::{Connection, Network, NetworkState};

pub type NetworkInventory = Inventory<Network>;

/// Third octets tried, in order, for automatic `192.168.x.0/24` subnets.
const AUTO_SUBNET_OCTETS: std::ops::RangeInclusive<u8> = 122..=254;

fn network_name(ident: &[String]) -> Result<&str, ModelError> {
    match ident {
        [name] => Ok(name.as_str()),
        _ => Err(ModelError::NotFound("network not found".into())),
    }
}

/// Accepts `a.b.c.d/len` with `len <= 32`.
fn validate_subnet(subnet: &str) -> Result<(), ModelError> {
    let invalid = || ModelError::invalid("subnet", format!("'{subnet}' is not an IPv4 CIDR"));
    let (addr, len) = subnet.split_once('/').ok_or_else(invalid)?;
    addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
    match len.parse::<u8>() {
        Ok(len) if len <= 32 => Ok(()),
        _ => Err(invalid()),
    }
}

pub struct NetworksModel {
    networks: Arc<NetworkInventory>,
}

impl NetworksModel {
    pub fn new(networks: Arc<NetworkInventory>) -> Self {
        Self { networks }
    }

    fn free_subnet(&self) -> Result<String, ModelError> {
        let used: Vec<String> = self
            .networks
            .names()
            .iter()
            .filter_map(|name| self.networks.get(name).ok())
            .map(|net| net.subnet)
            .collect();
        AUTO_SUBNET_OCTETS
            .map(|octet| format!("192.168.{octet}.0/24"))
            .find(|subnet| !used.contains(subnet))
            .ok_or_else(|| ModelError::OperationFailed("no free subnet left".into()))
    }
}

#[async_trait]
impl Listable for NetworksModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.networks.names())
    }
}

#[async_trait]
impl Creatable for NetworksModel {
    async fn create(&self, _parent: &[String], params: Params) -> Result<Created, ModelError> {
        let name = required_str(&params, "name")?;
        let connection = required_str(&params, "connection")?
            .parse::<Connection>()
            .map_err(|reason| ModelError::invalid("connection", reason))?;
        let interface = optional_str(&params, "interface")?;
        let subnet = optional_str(&params, "subnet")?;

        let (subnet, interface) = match connection {
            Connection::Bridge => {
                let interface =
                    interface.ok_or_else(|| ModelError::MissingParameter("interface".into()))?;
                (String::new(), Some(interface))
            }
            Connection::Nat | Connection::Isolated => {
                let subnet = match subnet {
                    Some(subnet) => {
                        validate_subnet(&subnet)?;
                        subnet
                    }
                    None => self.free_subnet()?,
                };
                (subnet, None)
            }
        };

        let network = Network {
            name: name.clone(),
            connection,
            subnet,
            interface,
            state: NetworkState::Inactive,
            autostart: true,
            vms: Vec::new(),
        };
        self.networks.insert_new(&name, network)?;
        info!(network = %name, ?connection, "Network defined");
        Ok(Created::Resource(name))
    }
}

impl CollectionModel for NetworksModel {
    fn kind(&self) -> &'static str {
        "networks"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }
}

pub struct NetworkModel {
    networks: Arc<NetworkInventory>,
}

impl NetworkModel {
    pub fn new(networks: Arc<NetworkInventory>) -> Self {
        Self { networks }
    }
}

#[async_trait]
impl Lookupable for NetworkModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        to_json(&self.networks.get(network_name(ident)?)?)
    }
}

#[async_trait]
impl Deletable for NetworkModel {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        let name = network_name(ident)?;
        self.networks.remove_if(name, |net| {
            if net.state == NetworkState::Active {
                return Err(ModelError::InvalidOperation(format!(
                    "network '{name}' must be deactivated before it can be deleted"
                )));
            }
            Ok(())
        })?;
        info!(network = %name, "Network deleted");
        Ok(())
    }
}

#[async_trait]
impl Actionable for NetworkModel {
    fn actions(&self) -> &[&'static str] {
        &["activate", "deactivate"]
    }

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        let name = network_name(ident)?;
        let target = match action {
            "activate" => NetworkState::Active,
            "deactivate" => NetworkState::Inactive,
            other => {
                return Err(ModelError::InvalidOperation(format!(
                    "unknown network action '{other}'"
                )))
            }
        };
        self.networks.modify(name, |net| {
            if net.state == target {
                return Err(ModelError::InvalidOperation(format!(
                    "network '{name}' is already {action}d"
                )));
            }
            net.state = target;
            Ok(())
        })?;
        info!(network = %name, action, "Network state changed");
        Ok(ActionOutcome::Done)
    }
}

impl ResourceModel for NetworkModel {
    fn kind(&self) -> &'static str {
        "network"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }

    fn as_actionable(&self) -> Option<&dyn Actionable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    fn ident(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    fn models() -> (NetworksModel, NetworkModel) {
        let inventory = Arc::new(NetworkInventory::new("network"));
        (
            NetworksModel::new(Arc::clone(&inventory)),
            NetworkModel::new(inventory),
        )
    }

    #[tokio::test]
    async fn nat_networks_get_distinct_subnets() {
        let (nets, net) = models();
        nets.create(&[], params(json!({"name": "a", "connection": "nat"})))
            .await
            .unwrap();
        nets.create(&[], params(json!({"name": "b", "connection": "isolated"})))
            .await
            .unwrap();

        let a = net.lookup(&ident("a")).await.unwrap();
        assert_eq!(
            a,
            json!({
                "name": "a",
                "connection": "nat",
                "subnet": "192.168.122.0/24",
                "state": "inactive",
                "autostart": true,
                "vms": [],
            })
        );
        let b = net.lookup(&ident("b")).await.unwrap();
        assert_eq!(b["subnet"], "192.168.123.0/24");
    }

    #[tokio::test]
    async fn bridge_requires_an_interface() {
        let (nets, net) = models();
        assert_eq!(
            nets.create(&[], params(json!({"name": "br", "connection": "bridge"})))
                .await,
            Err(ModelError::MissingParameter("interface".into()))
        );
        nets.create(
            &[],
            params(json!({"name": "br", "connection": "bridge", "interface": "eth0"})),
        )
        .await
        .unwrap();
        let info = net.lookup(&ident("br")).await.unwrap();
        assert_eq!(info["interface"], "eth0");
        assert_eq!(info["subnet"], "");
    }

    #[tokio::test]
    async fn invalid_connection_and_subnet_are_rejected() {
        let (nets, _) = models();
        assert!(matches!(
            nets.create(&[], params(json!({"name": "x", "connection": "macvtap"}))).await,
            Err(ModelError::InvalidParameter { ref name, .. }) if name == "connection"
        ));
        assert!(matches!(
            nets.create(
                &[],
                params(json!({"name": "x", "connection": "nat", "subnet": "10.0.0.0/40"}))
            )
            .await,
            Err(ModelError::InvalidParameter { ref name, .. }) if name == "subnet"
        ));
    }

    #[tokio::test]
    async fn active_network_cannot_be_deleted() {
        let (nets, net) = models();
        nets.create(&[], params(json!({"name": "a", "connection": "nat"})))
            .await
            .unwrap();
        net.act(&ident("a"), "activate", Params::new()).await.unwrap();
        assert!(matches!(
            net.act(&ident("a"), "activate", Params::new()).await,
            Err(ModelError::InvalidOperation(_))
        ));
        assert!(matches!(
            net.delete(&ident("a")).await,
            Err(ModelError::InvalidOperation(_))
        ));
        net.act(&ident("a"), "deactivate", Params::new())
            .await
            .unwrap();
        net.delete(&ident("a")).await.unwrap();
        assert_eq!(nets.get_list(&[]).await.unwrap(), Vec::<String>::new());
    }
}
