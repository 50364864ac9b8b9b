//! # System Lifecycle
//!
//! [`HostSystem`] wires the sample backends into one entity tree and owns the
//! services they share:
//!
//! 1. **Shared state**: one inventory per entity family, handed to both the
//!    collection backend and its member backend.
//! 2. **Task engine**: asynchronous creates and actions (`storagevolumes`
//!    create, host `swupdate`) submit to it; `/tasks` reads it.
//! 3. **Object store**: repositories persist here.
//! 4. **Statistics sampler**: started on construction, stopped by
//!    [`HostSystem::shutdown`].
//!
//! ```rust,ignore
//! let system = HostSystem::new(&Config::default());
//! axum::serve(listener, system.router()).await?;
//! system.shutdown().await;
//! ```
//!
//! Tests swap the machine-facing parts through [`HostServices`]: a fake
//! counter source, a manual clock, a seeded package manager, a fixed device
//! list and a power switch that only records requests.

pub mod host_system;

pub use host_system::*;
