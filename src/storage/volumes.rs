//! `/storagepools/<pool>/storagevolumes` and its members.
//!
//! Volume creation is asynchronous. The request is validated while the client
//! waits (pool exists and is active, `name` and `capacity` present, name
//! free); allocation then runs as a task and the volume appears once the task
//! finishes. A name stays reserved while its allocation is pending.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use resource_framework::entity::{optional_str, optional_u64, required_str, to_json};
use resource_framework::{
    CollectionModel, Created, Creatable, Deletable, Listable, Lookupable, ModelError, Params,
    ResourceModel, TaskEngine,
};
use serde_json::Value;
use tracing::info;

use super::{pool_name, PoolInventory};
use crate::model::{StoragePool, StorageVolume};

fn require_active(pool: &StoragePool) -> Result<(), ModelError> {
    if pool.is_active() {
        Ok(())
    } else {
        Err(ModelError::InvalidOperation(format!(
            "storage pool '{}' is not active",
            pool.name
        )))
    }
}

fn volume_ident(ident: &[String]) -> Result<(&str, &str), ModelError> {
    match ident {
        [pool, volume] => Ok((pool.as_str(), volume.as_str())),
        _ => Err(ModelError::NotFound("storage volume not found".into())),
    }
}

pub struct StorageVolumesModel {
    pools: Arc<PoolInventory>,
    engine: Arc<TaskEngine>,
    alloc_delay: Duration,
    pending: Arc<Mutex<BTreeSet<(String, String)>>>,
}

impl StorageVolumesModel {
    pub fn new(pools: Arc<PoolInventory>, engine: Arc<TaskEngine>, alloc_delay: Duration) -> Self {
        Self {
            pools,
            engine,
            alloc_delay,
            pending: Arc::default(),
        }
    }

    /// Reserve `pool/name` or fail when it is taken.
    fn reserve(&self, pool: &StoragePool, name: &str) -> Result<(), ModelError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (pool.name.clone(), name.to_string());
        if pool.volumes.contains_key(name) || !pending.insert(key) {
            return Err(ModelError::invalid(
                "name",
                format!("storage volume '{name}' already exists in pool '{}'", pool.name),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Listable for StorageVolumesModel {
    async fn get_list(&self, parent: &[String]) -> Result<Vec<String>, ModelError> {
        let pool = self.pools.get(pool_name(parent)?)?;
        require_active(&pool)?;
        Ok(pool.volumes.into_keys().collect())
    }
}

#[async_trait]
impl Creatable for StorageVolumesModel {
    async fn create(&self, parent: &[String], params: Params) -> Result<Created, ModelError> {
        let pool_id = pool_name(parent)?.to_string();
        let name = required_str(&params, "name")?;
        let capacity = optional_u64(&params, "capacity")?
            .ok_or_else(|| ModelError::MissingParameter("capacity".into()))?;
        let allocation = optional_u64(&params, "allocation")?.unwrap_or(0);
        if allocation > capacity {
            return Err(ModelError::invalid(
                "allocation",
                "must not exceed the capacity",
            ));
        }
        let format = optional_str(&params, "format")?.unwrap_or_else(|| "raw".to_string());

        let pool = self.pools.get(&pool_id)?;
        require_active(&pool)?;
        self.reserve(&pool, &name)?;

        let volume = StorageVolume {
            path: format!("{}/{name}", pool.path.trim_end_matches('/')),
            name: name.clone(),
            capacity,
            allocation,
            format,
        };
        let target_uri = format!("/storagepools/{pool_id}/storagevolumes/{name}");
        let pools = Arc::clone(&self.pools);
        let pending = Arc::clone(&self.pending);
        let delay = self.alloc_delay;

        let id = self.engine.submit(Some(target_uri), move |task| async move {
            task.update(format!("allocating {capacity} bytes"));
            tokio::time::sleep(delay).await;
            let result = pools.modify(&pool_id, |pool| {
                require_active(pool)?;
                pool.volumes.insert(volume.name.clone(), volume);
                Ok(())
            });
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&(pool_id.clone(), name.clone()));
            result?;
            info!(pool = %pool_id, volume = %name, "Storage volume allocated");
            Ok(format!("storage volume '{name}' created"))
        });
        Ok(Created::Task(self.engine.lookup(id)?))
    }
}

impl CollectionModel for StorageVolumesModel {
    fn kind(&self) -> &'static str {
        "storagevolumes"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }
}

pub struct StorageVolumeModel {
    pools: Arc<PoolInventory>,
}

impl StorageVolumeModel {
    pub fn new(pools: Arc<PoolInventory>) -> Self {
        Self { pools }
    }
}

fn volume_not_found(pool: &str, volume: &str) -> ModelError {
    ModelError::NotFound(format!(
        "storage volume '{volume}' not found in pool '{pool}'"
    ))
}

#[async_trait]
impl Lookupable for StorageVolumeModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        let (pool_id, volume) = volume_ident(ident)?;
        let pool = self.pools.get(pool_id)?;
        let volume = pool
            .volumes
            .get(volume)
            .ok_or_else(|| volume_not_found(pool_id, volume))?;
        to_json(volume)
    }
}

#[async_trait]
impl Deletable for StorageVolumeModel {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        let (pool_id, volume) = volume_ident(ident)?;
        self.pools.modify(pool_id, |pool| {
            require_active(pool)?;
            pool.volumes
                .remove(volume)
                .map(|_| ())
                .ok_or_else(|| volume_not_found(pool_id, volume))
        })?;
        info!(pool = %pool_id, volume, "Storage volume deleted");
        Ok(())
    }
}

impl ResourceModel for StorageVolumeModel {
    fn kind(&self) -> &'static str {
        "storagevolume"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}
