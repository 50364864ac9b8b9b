//! # virt-api
//!
//! REST API for a virtualization host, built on the generic dispatch layer in
//! [`resource_framework`].
//!
//! Each entity family is a pair of backends, one for the collection and one
//! for its members, implementing only the capability traits it supports. The
//! framework maps paths and verbs onto them:
//!
//! ```text
//! GET    /vms                        VmsModel::get_list
//! POST   /vms                        VmsModel::create
//! GET    /vms/v1                     VmModel::lookup
//! POST   /vms/v1/start               VmModel::act("start")
//! POST   /storagepools/p/storagevolumes   StorageVolumesModel::create  -> 202 + task
//! GET    /tasks/1                    TaskModel::lookup
//! ```
//!
//! ## Modules
//!
//! - [`vms`], [`storage`], [`networks`], [`host`]: the backends.
//! - [`model`]: the serde records they serve.
//! - [`inventory`]: the locked in-memory table most backends share.
//! - [`config`]: command-line and environment configuration.
//! - [`lifecycle`]: [`HostSystem`](lifecycle::HostSystem), which wires the
//!   tree, owns the background services and shuts them down.

pub mod config;
pub mod host;
pub mod inventory;
pub mod lifecycle;
pub mod model;
pub mod networks;
pub mod storage;
pub mod vms;

pub use config::Config;
pub use lifecycle::{HostServices, HostSystem};
