//! Pending package updates, behind the [`PackageManager`] seam.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use resource_framework::entity::to_json;
use resource_framework::{CollectionModel, Listable, Lookupable, ModelError, ResourceModel};
use serde_json::Value;
use tracing::info;

use crate::model::PackageUpdate;

/// The host's package manager as the backends see it.
pub trait PackageManager: Send + Sync {
    /// Packages with an update available, sorted by name.
    fn updates(&self) -> Result<Vec<PackageUpdate>, ModelError>;

    /// The pending update of one package.
    fn pending(&self, name: &str) -> Result<PackageUpdate, ModelError>;

    /// Install the pending update of `name`. May block.
    fn apply(&self, name: &str) -> Result<(), ModelError>;
}

/// Package manager over an in-memory list of pending updates. Applying an
/// update removes it from the list.
#[derive(Debug, Default)]
pub struct MemoryPackageManager {
    pending: RwLock<BTreeMap<String, PackageUpdate>>,
}

impl MemoryPackageManager {
    pub fn new(updates: impl IntoIterator<Item = PackageUpdate>) -> Self {
        Self {
            pending: RwLock::new(
                updates
                    .into_iter()
                    .map(|u| (u.package_name.clone(), u))
                    .collect(),
            ),
        }
    }
}

fn not_found(name: &str) -> ModelError {
    ModelError::NotFound(format!("no update pending for package '{name}'"))
}

impl PackageManager for MemoryPackageManager {
    fn updates(&self) -> Result<Vec<PackageUpdate>, ModelError> {
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pending.values().cloned().collect())
    }

    fn pending(&self, name: &str) -> Result<PackageUpdate, ModelError> {
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        pending.get(name).cloned().ok_or_else(|| not_found(name))
    }

    fn apply(&self, name: &str) -> Result<(), ModelError> {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        let update = pending.remove(name).ok_or_else(|| not_found(name))?;
        info!(package = %name, version = %update.version, "Package updated");
        Ok(())
    }
}

/// `/host/packagesupdate`
pub struct PackagesUpdateModel {
    packages: Arc<dyn PackageManager>,
}

impl PackagesUpdateModel {
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self { packages }
    }
}

#[async_trait]
impl Listable for PackagesUpdateModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self
            .packages
            .updates()?
            .into_iter()
            .map(|u| u.package_name)
            .collect())
    }
}

impl CollectionModel for PackagesUpdateModel {
    fn kind(&self) -> &'static str {
        "packagesupdate"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }
}

/// `/host/packagesupdate/<package>`
pub struct PackageUpdateModel {
    packages: Arc<dyn PackageManager>,
}

impl PackageUpdateModel {
    pub fn new(packages: Arc<dyn PackageManager>) -> Self {
        Self { packages }
    }
}

#[async_trait]
impl Lookupable for PackageUpdateModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        match ident {
            [name] => to_json(&self.packages.pending(name)?),
            _ => Err(ModelError::NotFound("package not found".into())),
        }
    }
}

impl ResourceModel for PackageUpdateModel {
    fn kind(&self) -> &'static str {
        "packageupdate"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }
}

#[cfg(test)]
pub(crate) fn sample_update(name: &str) -> PackageUpdate {
    PackageUpdate {
        package_name: name.to_string(),
        arch: "x86_64".to_string(),
        version: "1.0-2".to_string(),
        repository: "updates".to_string(),
    }
}
