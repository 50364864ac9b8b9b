//! # Host
//!
//! `/host` and the subtrees below it:
//!
//! ```text
//! /host                           HostModel (lookup; swupdate, shutdown, reboot)
//! /host/stats                     HostStatsModel
//! /host/devices[/<name>]          DevicesModel / DeviceModel
//! /host/partitions[/<name>]       PartitionsModel / PartitionModel
//! /host/packagesupdate[/<pkg>]    PackagesUpdateModel / PackageUpdateModel
//! /host/repositories[/<id>]       RepositoriesModel / RepositoryModel
//! ```

pub mod devices;
pub mod info;
pub mod packages;
pub mod partitions;
pub mod power;
pub mod repositories;
pub mod stats;

pub use devices::{DeviceModel, DeviceSource, DevicesModel, StaticDevices, SysfsDevices};
pub use packages::{MemoryPackageManager, PackageManager, PackageUpdateModel, PackagesUpdateModel};
pub use partitions::{PartitionModel, PartitionTable, PartitionsModel};
pub use power::{HostPower, PowerAction, RecordingPower, SystemPower};
pub use repositories::{RepositoriesModel, RepositoryModel};
pub use stats::{
    Clock, CounterSource, HostStatsModel, HostStatsSampler, ManualClock, ProcCounterSource,
    TokioClock,
};

use std::sync::Arc;

use async_trait::async_trait;
use resource_framework::entity::to_json;
use resource_framework::{
    ActionOutcome, Actionable, Lookupable, ModelError, Params, ResourceModel, TaskEngine,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::model::{HostInfo, Vm};
use crate::vms::VmInventory;

/// `/host`
pub struct HostModel {
    info: HostInfo,
    packages: Arc<dyn PackageManager>,
    power: Arc<dyn HostPower>,
    vms: Arc<VmInventory>,
    engine: Arc<TaskEngine>,
}

impl HostModel {
    /// `info` is taken once; host facts do not change while we run.
    pub fn new(
        info: HostInfo,
        packages: Arc<dyn PackageManager>,
        power: Arc<dyn HostPower>,
        vms: Arc<VmInventory>,
        engine: Arc<TaskEngine>,
    ) -> Self {
        Self {
            info,
            packages,
            power,
            vms,
            engine,
        }
    }

    /// Power the host off or restart it, unless guests are still running.
    async fn power(&self, action: PowerAction) -> Result<ActionOutcome, ModelError> {
        let running = self.vms.names_where(Vm::is_running);
        if !running.is_empty() {
            return Err(ModelError::OperationFailed(format!(
                "cannot {action} the host while virtual machines are running: {}",
                running.join(", ")
            )));
        }
        self.power.request(action).await?;
        Ok(ActionOutcome::Done)
    }

    /// Apply every pending update in a background task.
    fn swupdate(&self) -> Result<ActionOutcome, ModelError> {
        let pending = self.packages.updates()?;
        if pending.is_empty() {
            return Err(ModelError::OperationFailed(
                "no packages marked for update".into(),
            ));
        }
        debug!(count = pending.len(), "Host is going to be updated");

        let packages = Arc::clone(&self.packages);
        let id = self.engine.submit_blocking(None, move |task| {
            let total = pending.len();
            for (done, update) in pending.iter().enumerate() {
                task.update(format!(
                    "updating {} ({}/{total})",
                    update.package_name,
                    done + 1
                ));
                packages.apply(&update.package_name)?;
            }
            info!(count = total, "Host packages updated");
            Ok(format!("{total} packages updated"))
        });
        Ok(ActionOutcome::Task(self.engine.lookup(id)?))
    }
}

#[async_trait]
impl Lookupable for HostModel {
    async fn lookup(&self, _ident: &[String]) -> Result<Value, ModelError> {
        to_json(&self.info)
    }
}

#[async_trait]
impl Actionable for HostModel {
    fn actions(&self) -> &[&'static str] {
        &["swupdate", "shutdown", "reboot"]
    }

    async fn act(
        &self,
        _ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        match action {
            "swupdate" => self.swupdate(),
            "shutdown" => self.power(PowerAction::Shutdown).await,
            "reboot" => self.power(PowerAction::Reboot).await,
            other => Err(ModelError::InvalidOperation(format!(
                "unknown host action '{other}'"
            ))),
        }
    }
}

impl ResourceModel for HostModel {
    fn kind(&self) -> &'static str {
        "host"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }

    fn as_actionable(&self) -> Option<&dyn Actionable> {
        Some(self)
    }
}
