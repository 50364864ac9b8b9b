//! `/storagepools` and `/storagepools/<name>`.

use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::{optional_bool, required_str, to_json};
use resource_framework::{
    ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable, Listable,
    Lookupable, ModelError, Params, ResourceModel, Updatable,
};
use serde_json::Value;
use tracing::info;

use super::{pool_name, PoolInventory};
use crate::model::{PoolState, PoolType, StoragePool};

pub struct StoragePoolsModel {
    pools: Arc<PoolInventory>,
}

impl StoragePoolsModel {
    pub fn new(pools: Arc<PoolInventory>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl Listable for StoragePoolsModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.pools.names())
    }
}

#[async_trait]
impl Creatable for StoragePoolsModel {
    async fn create(&self, _parent: &[String], params: Params) -> Result<Created, ModelError> {
        let name = required_str(&params, "name")?;
        let path = required_str(&params, "path")?;
        let pool_type = required_str(&params, "type")?
            .parse::<PoolType>()
            .map_err(|reason| ModelError::invalid("type", reason))?;
        if !path.starts_with('/') {
            return Err(ModelError::invalid("path", "must be an absolute path"));
        }
        self.pools
            .insert_new(&name, StoragePool::new(&name, path, pool_type))?;
        info!(pool = %name, ?pool_type, "Storage pool defined");
        Ok(Created::Resource(name))
    }
}

impl CollectionModel for StoragePoolsModel {
    fn kind(&self) -> &'static str {
        "storagepools"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }
}

pub struct StoragePoolModel {
    pools: Arc<PoolInventory>,
}

impl StoragePoolModel {
    pub fn new(pools: Arc<PoolInventory>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl Lookupable for StoragePoolModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        let pool = self.pools.get(pool_name(ident)?)?;
        let mut info = to_json(&pool)?;
        if let Value::Object(map) = &mut info {
            map.insert("nr_volumes".into(), Value::from(pool.volumes.len()));
        }
        Ok(info)
    }
}

#[async_trait]
impl Deletable for StoragePoolModel {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        let name = pool_name(ident)?;
        self.pools.remove_if(name, |pool| {
            if pool.is_active() {
                return Err(ModelError::InvalidOperation(format!(
                    "storage pool '{name}' must be deactivated before it can be deleted"
                )));
            }
            Ok(())
        })?;
        info!(pool = %name, "Storage pool deleted");
        Ok(())
    }
}

#[async_trait]
impl Updatable for StoragePoolModel {
    async fn update(&self, ident: &[String], params: Params) -> Result<String, ModelError> {
        let name = pool_name(ident)?;
        let autostart = optional_bool(&params, "autostart")?;
        self.pools.modify(name, |pool| {
            if let Some(autostart) = autostart {
                pool.autostart = autostart;
            }
            Ok(())
        })?;
        Ok(name.to_string())
    }
}

#[async_trait]
impl Actionable for StoragePoolModel {
    fn actions(&self) -> &[&'static str] {
        &["activate", "deactivate"]
    }

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        let name = pool_name(ident)?;
        let target = match action {
            "activate" => PoolState::Active,
            "deactivate" => PoolState::Inactive,
            other => {
                return Err(ModelError::InvalidOperation(format!(
                    "unknown storage pool action '{other}'"
                )))
            }
        };
        self.pools.modify(name, |pool| {
            if pool.state == target {
                return Err(ModelError::InvalidOperation(format!(
                    "storage pool '{name}' is already {target}"
                )));
            }
            pool.state = target;
            Ok(())
        })?;
        info!(pool = %name, state = %target, "Storage pool state changed");
        Ok(ActionOutcome::Done)
    }
}

impl ResourceModel for StoragePoolModel {
    fn kind(&self) -> &'static str {
        "storagepool"
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
