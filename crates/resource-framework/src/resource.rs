//! # Resource
//!
//! One addressable entity, built fresh for every request. A `Resource` holds
//! the backend model by reference-counted handle and the identifier segments
//! that locate the entity; its representation always comes from a fresh
//! `lookup`.
//!
//! | Verb     | Backend op | Success          |
//! |----------|------------|------------------|
//! | `GET`    | lookup     | 200 + body       |
//! | `DELETE` | delete     | 204              |
//! | `PUT`    | update     | 200 + fresh body |
//!
//! Actions (`POST /<resource>/<action>`) are dispatched through
//! [`Resource::act`].

use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::{ActionOutcome, ResourceModel};
use crate::error::DispatchError;
use crate::naming::{method_name, Operation};
use crate::negotiate::{check_accept, parse_params};
use crate::reply::Reply;

pub struct Resource {
    model: Arc<dyn ResourceModel>,
    ident: Vec<String>,
    uri: String,
}

impl Resource {
    pub fn new(model: Arc<dyn ResourceModel>, ident: Vec<String>, uri: String) -> Self {
        Self { model, ident, uri }
    }

    pub fn kind(&self) -> &'static str {
        self.model.kind()
    }

    pub fn ident(&self) -> &[String] {
        &self.ident
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn unsupported(&self, op: Operation<'_>) -> DispatchError {
        DispatchError::MethodNotAllowed(format!(
            "{} is not supported",
            method_name(self.kind(), op)
        ))
    }

    /// Current representation. A model without `lookup` renders as `{}`.
    pub async fn lookup(&self) -> Result<Value, DispatchError> {
        let Some(model) = self.model.as_lookupable() else {
            return Ok(Value::Object(Map::new()));
        };
        debug!(
            method = %method_name(self.kind(), Operation::Lookup),
            ident = ?self.ident,
            "Invoke"
        );
        Ok(model.lookup(&self.ident).await?)
    }

    /// Dispatch a verb addressed to the resource itself.
    pub async fn handle(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Reply, DispatchError> {
        match *method {
            Method::GET => {
                check_accept(headers)?;
                Ok(Reply::ok(self.lookup().await?))
            }
            Method::DELETE => self.delete().await,
            Method::PUT => {
                check_accept(headers)?;
                self.update(headers, body).await
            }
            _ => Err(DispatchError::MethodNotAllowed(format!(
                "{method} is not allowed on {}",
                self.kind()
            ))),
        }
    }

    async fn delete(&self) -> Result<Reply, DispatchError> {
        let Some(model) = self.model.as_deletable() else {
            return Err(self.unsupported(Operation::Delete));
        };
        debug!(
            method = %method_name(self.kind(), Operation::Delete),
            ident = ?self.ident,
            "Invoke"
        );
        model.delete(&self.ident).await?;
        Ok(Reply::NoContent)
    }

    async fn update(&self, headers: &HeaderMap, body: &[u8]) -> Result<Reply, DispatchError> {
        let Some(model) = self.model.as_updatable() else {
            return Err(self.unsupported(Operation::Update));
        };
        let params = parse_params(headers, body)?;
        debug!(
            method = %method_name(self.kind(), Operation::Update),
            ident = ?self.ident,
            ?params,
            "Invoke"
        );
        let new_id = model.update(&self.ident, params).await?;
        let renamed = self.renamed(new_id);
        Ok(Reply::ok(renamed.lookup().await?))
    }

    fn renamed(&self, new_id: String) -> Resource {
        let mut ident = self.ident.clone();
        let mut uri = self.uri.clone();
        if let Some(last) = ident.last_mut() {
            if *last != new_id {
                if let Some((parent, _)) = uri.rsplit_once('/') {
                    uri = format!("{parent}/{}", urlencoding::encode(&new_id));
                }
                *last = new_id;
            }
        }
        Resource::new(Arc::clone(&self.model), ident, uri)
    }

    /// Whether `name` is one of the model's actions.
    pub fn has_action(&self, name: &str) -> bool {
        self.model
            .as_actionable()
            .is_some_and(|a| a.actions().contains(&name))
    }

    /// Dispatch `POST /<resource>/<action>`.
    pub async fn act(
        &self,
        action: &str,
        method: &Method,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Reply, DispatchError> {
        if *method != Method::POST {
            return Err(DispatchError::MethodNotAllowed(format!(
                "{method} is not allowed on {} action '{action}'",
                self.kind()
            )));
        }
        check_accept(headers)?;
        let Some(model) = self.model.as_actionable() else {
            return Err(self.unsupported(Operation::Action(action)));
        };
        let params = parse_params(headers, body)?;
        debug!(
            method = %method_name(self.kind(), Operation::Action(action)),
            ident = ?self.ident,
            "Invoke"
        );
        match model.act(&self.ident, action, params).await? {
            ActionOutcome::Done => Ok(Reply::ok(self.lookup().await?)),
            ActionOutcome::Task(task) => Ok(Reply::accepted(&task)),
        }
    }
}
