//! # Storage
//!
//! Storage pools and the volumes nested inside them. Both backends share one
//! [`PoolInventory`]; a pool record owns its volumes, so removing a pool
//! removes them too.
//!
//! ```text
//! /storagepools                                  StoragePoolsModel
//! /storagepools/<pool>                           StoragePoolModel
//! /storagepools/<pool>/storagevolumes            StorageVolumesModel
//! /storagepools/<pool>/storagevolumes/<volume>   StorageVolumeModel
//! ```

pub mod pools;
pub mod volumes;

pub use pools::{StoragePoolModel, StoragePoolsModel};
pub use volumes::{StorageVolumeModel, StorageVolumesModel};

use resource_framework::ModelError;

use crate::inventory::Inventory;
use crate::model::StoragePool;

pub type PoolInventory = Inventory<StoragePool>;

fn pool_name(ident: &[String]) -> Result<&str, ModelError> {
    match ident.first() {
        Some(name) => Ok(name.as_str()),
        None => Err(ModelError::NotFound("storage pool not found".into())),
    }
}
