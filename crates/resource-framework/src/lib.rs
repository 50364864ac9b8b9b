//! # Resource Framework
//!
//! This crate exposes a tree of domain entities over HTTP without registering
//! a single route per path. Backends are plain objects implementing a subset
//! of the capability traits in [`entity`]; the [`Dispatcher`] walks each
//! request path against the entity tree, picks the operation from the HTTP
//! verb, asks the backend for the matching capability and renders the result
//! as JSON.
//!
//! ## Architecture Overview
//!
//! ```text
//! request ─► Dispatcher::resolve ─► Resource | Collection | Action
//!                                         │
//!                    verb check (405) ◄───┘
//!                    Accept check (406)
//!                    capability check (405)
//!                    body parse (415 / 400)
//!                    backend call ─► Reply (200/201/202/204) | DispatchError
//! ```
//!
//! The layers, leaf first:
//!
//! 1. **Naming** ([`naming`]) - `"<kind>_<operation>"` method names for logs
//!    and 405 messages.
//! 2. **Negotiation** ([`negotiate`]) - one media type, `application/json`.
//! 3. **Tasks** ([`task`]) - ids, background execution and status of
//!    operations that outlive a request.
//! 4. **Resource / Collection** ([`resource`], [`collection`]) - verb logic
//!    for one entity and for a set of entities.
//! 5. **Dispatcher** ([`dispatcher`]) - the entity tree, the path walk and the
//!    axum fallback handler.
//!
//! ## Declaring a Tree
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_framework::mock::MockBackend;
//! use resource_framework::task::{tasks_node, TaskEngine};
//! use resource_framework::{CollectionNode, Dispatcher, ResourceNode};
//!
//! let pools = MockBackend::new("storagepools", "storagepool");
//! let volumes = MockBackend::new("storagevolumes", "storagevolume");
//! let engine = Arc::new(TaskEngine::default());
//!
//! let router = Dispatcher::new()
//!     .mount(
//!         "storagepools",
//!         CollectionNode::shared(
//!             pools.collection(),
//!             ResourceNode::shared(pools.resource()).child(
//!                 "storagevolumes",
//!                 CollectionNode::shared(
//!                     volumes.collection(),
//!                     ResourceNode::shared(volumes.resource()),
//!                 ),
//!             ),
//!         ),
//!     )
//!     .mount("tasks", tasks_node(&engine))
//!     .into_router();
//! # let _ = router;
//! ```
//!
//! `GET /storagepools/pool1/storagevolumes/vol1` then reaches the volume
//! backend's `lookup` with the identifier `["pool1", "vol1"]`.
//!
//! ## Long Operations
//!
//! A backend whose create or action takes a while submits the work to the
//! shared [`TaskEngine`] and returns the task snapshot. The client receives
//! `202 Accepted` with `Location: /tasks/<id>` and polls that URI until the
//! status leaves `running`.
//!
//! ## Testing
//!
//! [`mock::MockBackend`] implements every capability in memory, lets tests
//! switch capabilities off and records each call. See the [`mock`] module.

pub mod collection;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod mock;
pub mod naming;
pub mod negotiate;
pub mod reply;
pub mod resource;
pub mod store;
pub mod task;
pub mod tracing;

// Re-export core types for convenience
pub use collection::{Collection, ListQuery};
pub use dispatcher::{CollectionNode, Dispatcher, Node, ResourceNode, Target};
pub use entity::{
    ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable, Flags, Listable,
    Lookupable, Params, ResourceModel, Updatable,
};
pub use error::{DispatchError, ModelError};
pub use reply::Reply;
pub use resource::Resource;
pub use store::{MemoryStore, ObjectStore, StoreError};
pub use task::{TaskConfig, TaskEngine, TaskHandle, TaskId, TaskSnapshot, TaskStatus};
