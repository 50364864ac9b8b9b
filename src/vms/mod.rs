//! # Virtual Machines
//!
//! `/vms` lists and defines guests; `/vms/<name>` reads, edits and removes
//! one, and offers the `start` and `stop` actions.
//!
//! | Request                  | Effect                                   |
//! |--------------------------|------------------------------------------|
//! | `POST /vms`              | define a shut off guest (`name` required)|
//! | `PUT /vms/<name>`        | change `name`, `memory` or `cpus`        |
//! | `POST /vms/<name>/start` | shutoff → running                        |
//! | `POST /vms/<name>/stop`  | running → shutoff                        |
//! | `DELETE /vms/<name>`     | only while shut off                      |

pub mod error;

pub use error::VmError;

use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::{optional_str, optional_u64, required_str, to_json};
use resource_framework::{
    ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable, Listable,
    Lookupable, ModelError, Params, ResourceModel, Updatable,
};
use serde_json::Value;
use tracing::info;

use crate::inventory::Inventory;
use crate::model::{Vm, VmState, DEFAULT_MEMORY_MIB};

pub type VmInventory = Inventory<Vm>;

fn name_of(ident: &[String]) -> Result<&str, ModelError> {
    match ident {
        [name] => Ok(name.as_str()),
        _ => Err(ModelError::NotFound("vm not found".into())),
    }
}

/// `/vms`
pub struct VmsModel {
    vms: Arc<VmInventory>,
}

impl VmsModel {
    pub fn new(vms: Arc<VmInventory>) -> Self {
        Self { vms }
    }
}

#[async_trait]
impl Listable for VmsModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.vms.names())
    }
}

#[async_trait]
impl Creatable for VmsModel {
    async fn create(&self, _parent: &[String], params: Params) -> Result<Created, ModelError> {
        let name = required_str(&params, "name")?;
        let memory = optional_u64(&params, "memory")?.unwrap_or(DEFAULT_MEMORY_MIB);
        let cpus = optional_u64(&params, "cpus")?.unwrap_or(1);
        self.vms.insert_new(&name, Vm::new(&name, memory, cpus))?;
        info!(vm = %name, memory, cpus, "VM defined");
        Ok(Created::Resource(name))
    }
}

impl CollectionModel for VmsModel {
    fn kind(&self) -> &'static str {
        "vms"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }
}

/// `/vms/<name>`
pub struct VmModel {
    vms: Arc<VmInventory>,
}

impl VmModel {
    pub fn new(vms: Arc<VmInventory>) -> Self {
        Self { vms }
    }
}

#[async_trait]
impl Lookupable for VmModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        to_json(&self.vms.get(name_of(ident)?)?)
    }
}

#[async_trait]
impl Deletable for VmModel {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        let name = name_of(ident)?;
        self.vms.remove_if(name, |vm| {
            if vm.is_running() {
                return Err(VmError::MustBeShutoff(name.to_string(), "deleted").into());
            }
            Ok(())
        })?;
        info!(vm = %name, "VM deleted");
        Ok(())
    }
}

#[async_trait]
impl Updatable for VmModel {
    async fn update(&self, ident: &[String], params: Params) -> Result<String, ModelError> {
        let name = name_of(ident)?;
        let new_name = optional_str(&params, "name")?.unwrap_or_else(|| name.to_string());
        let memory = optional_u64(&params, "memory")?;
        let cpus = optional_u64(&params, "cpus")?;

        self.vms.rename(name, &new_name, |vm| {
            if vm.is_running() {
                return Err(VmError::MustBeShutoff(name.to_string(), "edited").into());
            }
            vm.name = new_name.clone();
            if let Some(memory) = memory {
                vm.memory = memory;
            }
            if let Some(cpus) = cpus {
                vm.cpus = cpus;
            }
            Ok(())
        })?;
        Ok(new_name)
    }
}

#[async_trait]
impl Actionable for VmModel {
    fn actions(&self) -> &[&'static str] {
        &["start", "stop"]
    }

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        let name = name_of(ident)?;
        self.vms.modify(name, |vm| {
            match (action, vm.state) {
                ("start", VmState::Shutoff) => vm.state = VmState::Running,
                ("start", VmState::Running) => return Err(VmError::AlreadyRunning(name.into()).into()),
                ("stop", VmState::Running) => vm.state = VmState::Shutoff,
                ("stop", VmState::Shutoff) => return Err(VmError::NotRunning(name.into()).into()),
                _ => {
                    return Err(ModelError::InvalidOperation(format!(
                        "unknown vm action '{action}'"
                    )))
                }
            }
            Ok(())
        })?;
        info!(vm = %name, action, "VM state changed");
        Ok(ActionOutcome::Done)
    }
}

impl ResourceModel for VmModel {
    fn kind(&self) -> &'static str {
        "vm"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
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

    fn models() -> (VmsModel, VmModel) {
        let vms = Arc::new(VmInventory::new("vm"));
        (VmsModel::new(Arc::clone(&vms)), VmModel::new(vms))
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (vms, vm) = models();
        let created = vms.create(&[], params(json!({"name": "v1"}))).await.unwrap();
        assert_eq!(created, Created::Resource("v1".into()));

        let info = vm.lookup(&ident("v1")).await.unwrap();
        assert_eq!(
            info,
            json!({"name": "v1", "state": "shutoff", "memory": 1024, "cpus": 1})
        );
    }

    #[tokio::test]
    async fn create_validates_parameters() {
        let (vms, _) = models();
        assert_eq!(
            vms.create(&[], params(json!({"memory": 512}))).await,
            Err(ModelError::MissingParameter("name".into()))
        );
        assert!(matches!(
            vms.create(&[], params(json!({"name": "v", "memory": -1}))).await,
            Err(ModelError::InvalidParameter { ref name, .. }) if name == "memory"
        ));
    }

    #[tokio::test]
    async fn running_vm_cannot_be_deleted_or_edited() {
        let (vms, vm) = models();
        vms.create(&[], params(json!({"name": "v1"}))).await.unwrap();
        vm.act(&ident("v1"), "start", Params::new()).await.unwrap();

        assert!(matches!(
            vm.delete(&ident("v1")).await,
            Err(ModelError::InvalidOperation(_))
        ));
        assert!(matches!(
            vm.update(&ident("v1"), params(json!({"memory": 2048}))).await,
            Err(ModelError::InvalidOperation(_))
        ));
        assert!(matches!(
            vm.act(&ident("v1"), "start", Params::new()).await,
            Err(ModelError::InvalidOperation(_))
        ));

        vm.act(&ident("v1"), "stop", Params::new()).await.unwrap();
        vm.delete(&ident("v1")).await.unwrap();
        assert!(matches!(
            vm.lookup(&ident("v1")).await,
            Err(ModelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_renames() {
        let (vms, vm) = models();
        vms.create(&[], params(json!({"name": "v1"}))).await.unwrap();
        let new_id = vm
            .update(&ident("v1"), params(json!({"name": "v2", "cpus": 4})))
            .await
            .unwrap();
        assert_eq!(new_id, "v2");
        assert_eq!(vms.get_list(&[]).await.unwrap(), vec!["v2"]);
        assert_eq!(vm.lookup(&ident("v2")).await.unwrap()["cpus"], 4);
    }
}
