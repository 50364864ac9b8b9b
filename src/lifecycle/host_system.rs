use std::sync::Arc;

use axum::Router;
use resource_framework::task::tasks_node;
use resource_framework::{
    CollectionNode, Dispatcher, MemoryStore, ObjectStore, ResourceNode, TaskEngine,
};
use tracing::info;

use crate::config::Config;
use crate::host::{
    Clock, CounterSource, DeviceModel, DeviceSource, DevicesModel, HostModel, HostPower,
    HostStatsModel, HostStatsSampler, MemoryPackageManager, PackageManager, PackageUpdateModel,
    PackagesUpdateModel, PartitionModel, PartitionTable, PartitionsModel, ProcCounterSource,
    RepositoriesModel, RepositoryModel, SysfsDevices, SystemPower, TokioClock,
};
use crate::model::{HostInfo, PackageUpdate};
use crate::networks::{NetworkInventory, NetworkModel, NetworksModel};
use crate::storage::{
    PoolInventory, StoragePoolModel, StoragePoolsModel, StorageVolumeModel, StorageVolumesModel,
};
use crate::vms::{VmInventory, VmModel, VmsModel};

/// The parts of the host the backends talk to.
pub struct HostServices {
    pub info: HostInfo,
    pub counters: Arc<dyn CounterSource>,
    pub clock: Arc<dyn Clock>,
    pub packages: Arc<dyn PackageManager>,
    pub partitions: PartitionTable,
    pub devices: Arc<dyn DeviceSource>,
    pub power: Arc<dyn HostPower>,
}

impl HostServices {
    /// The running machine, with the sample package updates.
    pub fn probe() -> Self {
        Self {
            info: crate::host::info::probe(),
            counters: Arc::new(ProcCounterSource::default()),
            clock: Arc::new(TokioClock::default()),
            packages: Arc::new(MemoryPackageManager::new(sample_updates())),
            partitions: PartitionTable::default(),
            devices: Arc::new(SysfsDevices::default()),
            power: Arc::new(SystemPower),
        }
    }
}

fn sample_updates() -> Vec<PackageUpdate> {
    [
        ("kernel", "6.8.9-300.fc40"),
        ("openssl", "3.2.1-6.fc40"),
        ("qemu-kvm", "8.2.2-1.fc40"),
    ]
    .into_iter()
    .map(|(name, version)| PackageUpdate {
        package_name: name.to_string(),
        arch: "x86_64".to_string(),
        version: version.to_string(),
        repository: "updates".to_string(),
    })
    .collect()
}

/// Owner of everything the API serves: the backends, the task engine, the
/// object store and the statistics sampler.
pub struct HostSystem {
    pub engine: Arc<TaskEngine>,
    pub store: Arc<dyn ObjectStore>,
    pub sampler: Arc<HostStatsSampler>,
    router: Router,
}

impl HostSystem {
    /// Build the system for the running machine and start sampling.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &Config) -> Self {
        Self::with_services(config, HostServices::probe())
    }

    pub fn with_services(config: &Config, services: HostServices) -> Self {
        let engine = Arc::new(TaskEngine::new(config.task_config()));
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let sampler = Arc::new(HostStatsSampler::new(services.counters, services.clock));
        sampler.start(config.stats_interval());

        let vms = Arc::new(VmInventory::new("vm"));
        let pools = Arc::new(PoolInventory::new("storage pool"));
        let networks = Arc::new(NetworkInventory::new("network"));
        let partitions = Arc::new(services.partitions);
        let packages = services.packages;

        let vms_node = CollectionNode::new(
            VmsModel::new(Arc::clone(&vms)),
            ResourceNode::new(VmModel::new(Arc::clone(&vms))),
        );

        let volumes_node = CollectionNode::new(
            StorageVolumesModel::new(
                Arc::clone(&pools),
                Arc::clone(&engine),
                config.volume_alloc_delay(),
            ),
            ResourceNode::new(StorageVolumeModel::new(Arc::clone(&pools))),
        );
        let pools_node = CollectionNode::new(
            StoragePoolsModel::new(Arc::clone(&pools)),
            ResourceNode::new(StoragePoolModel::new(pools)).child("storagevolumes", volumes_node),
        );

        let networks_node = CollectionNode::new(
            NetworksModel::new(Arc::clone(&networks)),
            ResourceNode::new(NetworkModel::new(networks)),
        );

        let host_node = ResourceNode::new(HostModel::new(
            services.info,
            Arc::clone(&packages),
            services.power,
            vms,
            Arc::clone(&engine),
        ))
        .child(
            "stats",
            ResourceNode::new(HostStatsModel::new(Arc::clone(&sampler))),
        )
        .child(
            "devices",
            CollectionNode::new(
                DevicesModel::new(Arc::clone(&services.devices)),
                ResourceNode::new(DeviceModel::new(services.devices)),
            ),
        )
        .child(
            "partitions",
            CollectionNode::new(
                PartitionsModel::new(Arc::clone(&partitions)),
                ResourceNode::new(PartitionModel::new(partitions)),
            ),
        )
        .child(
            "packagesupdate",
            CollectionNode::new(
                PackagesUpdateModel::new(Arc::clone(&packages)),
                ResourceNode::new(PackageUpdateModel::new(packages)),
            ),
        )
        .child(
            "repositories",
            CollectionNode::new(
                RepositoriesModel::new(Arc::clone(&store)),
                ResourceNode::new(RepositoryModel::new(Arc::clone(&store))),
            ),
        );

        let router = Dispatcher::new()
            .mount("vms", vms_node)
            .mount("storagepools", pools_node)
            .mount("networks", networks_node)
            .mount("host", host_node)
            .mount("tasks", tasks_node(&engine))
            .into_router();

        info!("Host system ready");
        Self {
            engine,
            store,
            sampler,
            router,
        }
    }

    /// The HTTP surface. Cheap to clone.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Stop background services and wait for them.
    pub async fn shutdown(&self) {
        info!("Shutting down host system");
        self.sampler.stop().await;
        info!("Host system stopped");
    }
}
