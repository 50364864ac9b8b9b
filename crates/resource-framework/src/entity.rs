//! # Model Capabilities
//!
//! A backend model is a plain object that implements a subset of the
//! capability traits below. The dispatcher never guesses: it asks the model
//! for a capability (`as_lookupable`, `as_creatable`, ...) and treats `None`
//! as "this entity kind does not support the operation".
//!
//! There are two model roles:
//!
//! - [`ResourceModel`] for one addressable entity (a VM, a storage volume, the
//!   host). Capabilities: [`Lookupable`], [`Deletable`], [`Updatable`],
//!   [`Actionable`].
//! - [`CollectionModel`] for a set of entities of one kind. Capabilities:
//!   [`Listable`], [`Creatable`].
//!
//! Each role carries a static kind tag used by the
//! [naming resolver](crate::naming).
//!
//! ## Identifiers
//!
//! Resources are addressed by an ordered list of segments. A storage volume
//! nested under a pool is `["pool1", "vol1"]`; a singleton like the host is
//! `[]`. Collections receive the segments of their parent (`["pool1"]` for the
//! volumes of `pool1`).
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use resource_framework::{Lookupable, ModelError, ResourceModel};
//! use serde_json::{json, Value};
//!
//! struct Host;
//!
//! #[async_trait]
//! impl Lookupable for Host {
//!     async fn lookup(&self, _ident: &[String]) -> Result<Value, ModelError> {
//!         Ok(json!({"cpu": "test"}))
//!     }
//! }
//!
//! impl ResourceModel for Host {
//!     fn kind(&self) -> &'static str { "host" }
//!     fn as_lookupable(&self) -> Option<&dyn Lookupable> { Some(self) }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::task::TaskSnapshot;

/// Request parameters as decoded from a JSON object body.
pub type Params = Map<String, Value>;

/// Underscore-prefixed query parameters of a collection `GET`, keyed without
/// the underscore.
pub type Flags = BTreeMap<String, String>;

/// Read one entity.
#[async_trait]
pub trait Lookupable: Send + Sync {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError>;
}

/// Remove one entity.
#[async_trait]
pub trait Deletable: Send + Sync {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError>;
}

/// Modify one entity. Returns the entity's last identifier segment after the
/// update, which differs from the old one when the update renames it.
#[async_trait]
pub trait Updatable: Send + Sync {
    async fn update(&self, ident: &[String], params: Params) -> Result<String, ModelError>;
}

/// Enumerate the members of a collection.
#[async_trait]
pub trait Listable: Send + Sync {
    async fn get_list(&self, parent: &[String]) -> Result<Vec<String>, ModelError>;

    /// Listing narrowed by query flags (`?_cap=fc_host` arrives as
    /// `{"cap": "fc_host"}`). Backends without flags ignore them.
    async fn get_list_flagged(
        &self,
        parent: &[String],
        flags: &Flags,
    ) -> Result<Vec<String>, ModelError> {
        let _ = flags;
        self.get_list(parent).await
    }
}

/// Outcome of a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    /// The entity exists now, addressed by this last identifier segment.
    Resource(String),
    /// Creation continues in the background.
    Task(TaskSnapshot),
}

/// Add a member to a collection.
#[async_trait]
pub trait Creatable: Send + Sync {
    async fn create(&self, parent: &[String], params: Params) -> Result<Created, ModelError>;
}

/// Outcome of a resource action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action completed; the resource is still addressable.
    Done,
    /// The action continues in the background.
    Task(TaskSnapshot),
}

/// Entity-specific operations beyond CRUD, such as `start` or `enable`.
#[async_trait]
pub trait Actionable: Send + Sync {
    /// Names of the supported actions. Each one becomes addressable as a path
    /// segment under the resource.
    fn actions(&self) -> &[&'static str];

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        params: Params,
    ) -> Result<ActionOutcome, ModelError>;
}

/// A single addressable entity kind.
pub trait ResourceModel: Send + Sync + 'static {
    /// Static kind tag, e.g. `"vm"`.
    fn kind(&self) -> &'static str;

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        None
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        None
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        None
    }

    fn as_actionable(&self) -> Option<&dyn Actionable> {
        None
    }
}

/// A set of entities of one kind.
pub trait CollectionModel: Send + Sync + 'static {
    /// Static kind tag, e.g. `"vms"`.
    fn kind(&self) -> &'static str;

    fn as_listable(&self) -> Option<&dyn Listable> {
        None
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        None
    }
}

// --- Helpers for model implementations ---

/// Serialize a typed record into the generic response envelope.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, ModelError> {
    serde_json::to_value(value).map_err(|e| ModelError::OperationFailed(e.to_string()))
}

/// Required string parameter.
pub fn required_str(params: &Params, name: &str) -> Result<String, ModelError> {
    match params.get(name) {
        None | Some(Value::Null) => Err(ModelError::MissingParameter(name.to_string())),
        Some(Value::String(s)) if s.is_empty() => Err(ModelError::invalid(name, "must not be empty")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ModelError::invalid(name, "must be a string")),
    }
}

/// Optional string parameter.
pub fn optional_str(params: &Params, name: &str) -> Result<Option<String>, ModelError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(params, name).map(Some),
    }
}

/// Optional positive integer parameter.
pub fn optional_u64(params: &Params, name: &str) -> Result<Option<u64>, ModelError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(n) if n > 0 => Ok(Some(n)),
            _ => Err(ModelError::invalid(name, "must be a positive integer")),
        },
    }
}

/// Optional boolean parameter.
pub fn optional_bool(params: &Params, name: &str) -> Result<Option<bool>, ModelError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ModelError::invalid(name, "must be a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn required_str_names_the_parameter() {
        let p = params(json!({"memory": 10}));
        assert_eq!(
            required_str(&p, "name"),
            Err(ModelError::MissingParameter("name".into()))
        );
        assert_eq!(
            required_str(&p, "memory"),
            Err(ModelError::invalid("memory", "must be a string"))
        );
    }

    #[test]
    fn optional_u64_rejects_zero_and_strings() {
        let p = params(json!({"a": 0, "b": "1", "c": 5}));
        assert!(optional_u64(&p, "a").is_err());
        assert!(optional_u64(&p, "b").is_err());
        assert_eq!(optional_u64(&p, "c"), Ok(Some(5)));
        assert_eq!(optional_u64(&p, "d"), Ok(None));
    }

    #[test]
    fn optional_bool_accepts_only_booleans() {
        let p = params(json!({"a": true, "b": "yes"}));
        assert_eq!(optional_bool(&p, "a"), Ok(Some(true)));
        assert!(optional_bool(&p, "b").is_err());
    }
}
