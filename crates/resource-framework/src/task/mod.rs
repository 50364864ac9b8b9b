//! Asynchronous task engine and the `tasks` entity kind that exposes it.

mod engine;
mod model;

pub use engine::{TaskConfig, TaskEngine, TaskHandle};
pub use model::{TaskId, TaskSnapshot, TaskStatus, DEFAULT_MESSAGE};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::dispatcher::{CollectionNode, ResourceNode};
use crate::entity::{to_json, CollectionModel, Listable, Lookupable, ResourceModel};
use crate::error::ModelError;

/// The `/tasks` subtree over `engine`, ready to mount.
pub fn tasks_node(engine: &Arc<TaskEngine>) -> CollectionNode {
    CollectionNode::new(
        TasksModel::new(Arc::clone(engine)),
        ResourceNode::new(TaskModel::new(Arc::clone(engine))),
    )
}

/// `/tasks`: every retained task id, ascending.
pub struct TasksModel {
    engine: Arc<TaskEngine>,
}

impl TasksModel {
    pub fn new(engine: Arc<TaskEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Listable for TasksModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.engine.list().iter().map(ToString::to_string).collect())
    }
}

impl CollectionModel for TasksModel {
    fn kind(&self) -> &'static str {
        "tasks"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }
}

/// `/tasks/<id>`: read-only task snapshot.
pub struct TaskModel {
    engine: Arc<TaskEngine>,
}

impl TaskModel {
    pub fn new(engine: Arc<TaskEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Lookupable for TaskModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        let id = match ident {
            [id] => id
                .parse::<TaskId>()
                .map_err(|_| ModelError::NotFound(format!("task {id} not found")))?,
            _ => return Err(ModelError::NotFound("task not found".into())),
        };
        to_json(&self.engine.lookup(id)?)
    }
}

impl ResourceModel for TaskModel {
    fn kind(&self) -> &'static str {
        "task"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }
}
