//! # Collection
//!
//! An addressable set of resources of one kind. The member list is never
//! cached: every `GET` asks the backend again and renders each member through
//! a fresh [`Resource::lookup`].
//!
//! Query parameters shape a `GET`. Keys with a leading underscore are flags
//! handed to the backend listing ([`Listable::get_list_flagged`]); any other
//! key keeps only members whose field renders equal to the value, so
//! `GET /vms?state=running` lists the running VMs.
//!
//! `args` are the identifier segments of the enclosing resources. Members are
//! addressed by `args + [id]`, which is how a storage volume nested under a
//! pool ends up with the identifier `["pool1", "vol1"]`.

use std::sync::Arc;

use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::Value;
use tracing::debug;

use crate::entity::{CollectionModel, Created, Flags, Listable, ResourceModel};
use crate::error::DispatchError;
use crate::naming::{method_name, Operation};
use crate::negotiate::{check_accept, parse_params};
use crate::reply::Reply;
use crate::resource::Resource;

/// A collection `GET` query split into backend flags and member filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub flags: Flags,
    pub filters: Vec<(String, String)>,
}

impl ListQuery {
    pub fn from_uri(uri: &Uri) -> Result<Self, DispatchError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|e| DispatchError::BadRequest(format!("invalid query: {e}")))?;
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.strip_prefix('_') {
                Some(flag) => {
                    query.flags.insert(flag.to_string(), value);
                }
                None => query.filters.push((key, value)),
            }
        }
        Ok(query)
    }

    fn keeps(&self, item: &Value) -> bool {
        self.filters.iter().all(|(key, wanted)| match item.get(key) {
            Some(Value::String(s)) => s == wanted,
            Some(other) => other.to_string() == *wanted,
            None => false,
        })
    }
}

pub struct Collection {
    model: Arc<dyn CollectionModel>,
    member: Arc<dyn ResourceModel>,
    args: Vec<String>,
    uri: String,
}

impl Collection {
    pub fn new(
        model: Arc<dyn CollectionModel>,
        member: Arc<dyn ResourceModel>,
        args: Vec<String>,
        uri: String,
    ) -> Self {
        Self {
            model,
            member,
            args,
            uri,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.model.kind()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The member resource addressed by `id`.
    pub fn resource(&self, id: &str) -> Resource {
        let mut ident = self.args.clone();
        ident.push(id.to_string());
        let uri = format!(
            "{}/{}",
            self.uri.trim_end_matches('/'),
            urlencoding::encode(id)
        );
        Resource::new(Arc::clone(&self.member), ident, uri)
    }

    pub async fn handle(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Reply, DispatchError> {
        match *method {
            Method::GET => {
                check_accept(headers)?;
                let query = ListQuery::from_uri(uri)?;
                Ok(Reply::ok(Value::Array(self.get(&query).await?)))
            }
            Method::POST => {
                check_accept(headers)?;
                self.create(headers, body).await
            }
            _ => Err(DispatchError::MethodNotAllowed(format!(
                "{method} is not allowed on {}",
                self.kind()
            ))),
        }
    }

    /// Every matching member's representation, in backend order. A
    /// collection without `get_list` is write-only and renders as `[]`.
    pub async fn get(&self, query: &ListQuery) -> Result<Vec<Value>, DispatchError> {
        let Some(model) = self.model.as_listable() else {
            return Ok(Vec::new());
        };
        debug!(
            method = %method_name(self.kind(), Operation::GetList),
            args = ?self.args,
            flags = ?query.flags,
            "Invoke"
        );
        let ids = list(model, &self.args, &query.flags).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in &ids {
            let item = self.resource(id).lookup().await?;
            if query.keeps(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn create(&self, headers: &HeaderMap, body: &[u8]) -> Result<Reply, DispatchError> {
        let Some(model) = self.model.as_creatable() else {
            return Err(DispatchError::MethodNotAllowed(format!(
                "{} is not supported",
                method_name(self.kind(), Operation::Create)
            )));
        };
        let params = parse_params(headers, body)?;
        debug!(
            method = %method_name(self.kind(), Operation::Create),
            args = ?self.args,
            ?params,
            "Invoke"
        );
        match model.create(&self.args, params).await? {
            Created::Resource(id) => {
                let child = self.resource(&id);
                let body = child.lookup().await?;
                Ok(Reply::created(body, child.uri().to_string()))
            }
            Created::Task(task) => Ok(Reply::accepted(&task)),
        }
    }
}

async fn list(
    model: &dyn Listable,
    args: &[String],
    flags: &Flags,
) -> Result<Vec<String>, DispatchError> {
    let ids = if flags.is_empty() {
        model.get_list(args).await?
    } else {
        model.get_list_flagged(args, flags).await?
    };
    Ok(ids)
}
