//! # Mock Backend & Testing Guide
//!
//! [`MockBackend`] is an in-memory model that implements every capability
//! trait. Individual capabilities can be switched off, which is how tests
//! reach the "operation absent" paths (405, write-only collections, `{}`
//! lookups) without writing a dedicated model per case.
//!
//! | Builder           | Effect                                          |
//! |-------------------|-------------------------------------------------|
//! | `read_only()`     | no delete, update, create or actions            |
//! | `without_list()`  | collection `GET` renders `[]`                   |
//! | `without_create()`| collection `POST` is 405                        |
//! | `without_lookup()`| resource `GET` renders `{}`                     |
//! | `async_create()`  | create hands off to a [`TaskEngine`]            |
//!
//! Every backend call is recorded as a [`Call`] and can be asserted with
//! [`MockBackend::calls`]. Failures are injected with
//! [`MockBackend::fail_next`]; the queued error is returned by the next call
//! of any kind.
//!
//! ## Example
//!
//! ```rust
//! use resource_framework::mock::{Call, MockBackend};
//! use resource_framework::{CollectionNode, Dispatcher, ResourceNode};
//! use axum::http::{HeaderMap, Method, Uri};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MockBackend::new("widgets", "widget").read_only();
//!     backend.insert(&["w1"], serde_json::json!({"name": "w1"}));
//!
//!     let dispatcher = Dispatcher::new().mount(
//!         "widgets",
//!         CollectionNode::shared(backend.collection(), ResourceNode::shared(backend.resource())),
//!     );
//!
//!     let reply = dispatcher
//!         .dispatch(&Method::DELETE, &Uri::from_static("/widgets/w1"), &HeaderMap::new(), b"")
//!         .await;
//!     assert_eq!(reply.unwrap_err().status_code(), 405);
//!     assert!(backend.calls().is_empty());
//! }
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::{
    required_str, ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable,
    Listable, Lookupable, Params, ResourceModel, Updatable,
};
use crate::error::ModelError;
use crate::task::TaskEngine;

/// One recorded backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Lookup(Vec<String>),
    Delete(Vec<String>),
    Update(Vec<String>, Params),
    GetList(Vec<String>),
    Create(Vec<String>, Params),
    Action(Vec<String>, String),
}

#[derive(Debug, Clone, Copy)]
struct Capabilities {
    lookup: bool,
    delete: bool,
    update: bool,
    list: bool,
    create: bool,
    actions: bool,
}

#[derive(Default)]
struct MockState {
    entries: Mutex<BTreeMap<Vec<String>, Value>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<ModelError>>,
}

impl MockState {
    fn record(&self, call: Call) -> Result<(), ModelError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        match self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<Vec<String>, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
struct AsyncCreate {
    engine: Arc<TaskEngine>,
    delay: Duration,
}

/// In-memory backend for one collection kind and its member kind.
#[derive(Clone)]
pub struct MockBackend {
    collection_kind: &'static str,
    resource_kind: &'static str,
    caps: Capabilities,
    async_create: Option<AsyncCreate>,
    state: Arc<MockState>,
}

/// The single action every mock resource offers while actions are enabled.
/// It sets `"poked": true` on the entry.
pub const POKE: &str = "poke";

impl MockBackend {
    pub fn new(collection_kind: &'static str, resource_kind: &'static str) -> Self {
        Self {
            collection_kind,
            resource_kind,
            caps: Capabilities {
                lookup: true,
                delete: true,
                update: true,
                list: true,
                create: true,
                actions: true,
            },
            async_create: None,
            state: Arc::default(),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.caps.delete = false;
        self.caps.update = false;
        self.caps.create = false;
        self.caps.actions = false;
        self
    }

    pub fn without_list(mut self) -> Self {
        self.caps.list = false;
        self
    }

    pub fn without_create(mut self) -> Self {
        self.caps.create = false;
        self
    }

    pub fn without_lookup(mut self) -> Self {
        self.caps.lookup = false;
        self
    }

    /// Creates finish on `engine` after `delay` instead of synchronously.
    pub fn async_create(mut self, engine: Arc<TaskEngine>, delay: Duration) -> Self {
        self.async_create = Some(AsyncCreate { engine, delay });
        self
    }

    /// Seed an entry without recording a call.
    pub fn insert(&self, ident: &[&str], value: Value) {
        let key = ident.iter().map(ToString::to_string).collect();
        self.state.entries().insert(key, value);
    }

    pub fn contains(&self, ident: &[&str]) -> bool {
        let key: Vec<String> = ident.iter().map(ToString::to_string).collect();
        self.state.entries().contains_key(&key)
    }

    /// Queue an error for the next backend call.
    pub fn fail_next(&self, error: ModelError) {
        self.state
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn resource(&self) -> Arc<dyn ResourceModel> {
        Arc::new(self.clone())
    }

    pub fn collection(&self) -> Arc<dyn CollectionModel> {
        Arc::new(MockCollection(self.clone()))
    }

    fn not_found(&self, ident: &[String]) -> ModelError {
        ModelError::NotFound(format!(
            "{} '{}' not found",
            self.resource_kind,
            ident.join("/")
        ))
    }
}

#[async_trait]
impl Lookupable for MockBackend {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        self.state.record(Call::Lookup(ident.to_vec()))?;
        self.state
            .entries()
            .get(ident)
            .cloned()
            .ok_or_else(|| self.not_found(ident))
    }
}

#[async_trait]
impl Deletable for MockBackend {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        self.state.record(Call::Delete(ident.to_vec()))?;
        self.state
            .entries()
            .remove(ident)
            .map(|_| ())
            .ok_or_else(|| self.not_found(ident))
    }
}

#[async_trait]
impl Updatable for MockBackend {
    async fn update(&self, ident: &[String], params: Params) -> Result<String, ModelError> {
        self.state.record(Call::Update(ident.to_vec(), params.clone()))?;
        let mut entries = self.state.entries();
        let mut entry = match entries.remove(ident) {
            Some(Value::Object(entry)) => entry,
            Some(_) => Params::new(),
            None => return Err(self.not_found(ident)),
        };
        entry.extend(params);
        let mut key = ident.to_vec();
        if let (Some(Value::String(name)), Some(last)) = (entry.get("name"), key.last_mut()) {
            *last = name.clone();
        }
        let new_id = key.last().cloned().unwrap_or_default();
        entries.insert(key, Value::Object(entry));
        Ok(new_id)
    }
}

#[async_trait]
impl Actionable for MockBackend {
    fn actions(&self) -> &[&'static str] {
        &[POKE]
    }

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        self.state
            .record(Call::Action(ident.to_vec(), action.to_string()))?;
        match self.state.entries().get_mut(ident) {
            Some(Value::Object(entry)) => {
                entry.insert("poked".into(), Value::Bool(true));
                Ok(ActionOutcome::Done)
            }
            _ => Err(self.not_found(ident)),
        }
    }
}

impl ResourceModel for MockBackend {
    fn kind(&self) -> &'static str {
        self.resource_kind
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        self.caps.lookup.then_some(self as &dyn Lookupable)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        self.caps.delete.then_some(self as &dyn Deletable)
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        self.caps.update.then_some(self as &dyn Updatable)
    }

    fn as_actionable(&self) -> Option<&dyn Actionable> {
        self.caps.actions.then_some(self as &dyn Actionable)
    }
}

struct MockCollection(MockBackend);

#[async_trait]
impl Listable for MockCollection {
    async fn get_list(&self, parent: &[String]) -> Result<Vec<String>, ModelError> {
        self.0.state.record(Call::GetList(parent.to_vec()))?;
        Ok(self
            .0
            .state
            .entries()
            .keys()
            .filter(|k| k.len() == parent.len() + 1 && k.starts_with(parent))
            .filter_map(|k| k.last().cloned())
            .collect())
    }
}

#[async_trait]
impl Creatable for MockCollection {
    async fn create(&self, parent: &[String], params: Params) -> Result<Created, ModelError> {
        self.0
            .state
            .record(Call::Create(parent.to_vec(), params.clone()))?;
        let name = required_str(&params, "name")?;
        let mut key = parent.to_vec();
        key.push(name.clone());
        if self.0.state.entries().contains_key(&key) {
            return Err(ModelError::invalid("name", format!("'{name}' already exists")));
        }

        let Some(AsyncCreate { engine, delay }) = self.0.async_create.clone() else {
            self.0.state.entries().insert(key, Value::Object(params));
            return Ok(Created::Resource(name));
        };
        let state = Arc::clone(&self.0.state);
        let id = engine.submit(Some(key.join("/")), move |handle| async move {
            handle.update("allocating");
            tokio::time::sleep(delay).await;
            state.entries().insert(key, Value::Object(params));
            Ok(format!("created {name}"))
        });
        Ok(Created::Task(engine.lookup(id)?))
    }
}

impl CollectionModel for MockCollection {
    fn kind(&self) -> &'static str {
        self.0.collection_kind
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        self.0.caps.list.then_some(self as &dyn Listable)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        self.0.caps.create.then_some(self as &dyn Creatable)
    }
}
