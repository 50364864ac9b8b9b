//! # Dispatcher
//!
//! The composition root. An entity tree is declared once from [`Node`]
//! values and mounted under top-level names; after that no per-path routes
//! exist. Every request walks the tree segment by segment:
//!
//! ```text
//! /storagepools/pool1/storagevolumes/vol1
//!  └─ collection  └─ member   └─ child     └─ member
//!     args: []       ["pool1"]   ["pool1"]    ["pool1", "vol1"]
//! ```
//!
//! - A collection followed by a segment moves to its member resource and
//!   appends the segment to the identifier.
//! - A resource followed by a segment moves to the child node of that name,
//!   or, as the final segment, to one of the resource's actions.
//! - Anything else is `404`.
//!
//! The dispatcher owns no mutable state. [`Dispatcher::into_router`] installs
//! it as the single fallback handler of an axum [`Router`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, error, info_span, Instrument};

use crate::collection::Collection;
use crate::entity::{CollectionModel, ResourceModel};
use crate::error::DispatchError;
use crate::reply::Reply;
use crate::resource::Resource;

/// A resource kind together with the nodes nested below it.
pub struct ResourceNode {
    model: Arc<dyn ResourceModel>,
    children: BTreeMap<String, Node>,
}

impl ResourceNode {
    pub fn new(model: impl ResourceModel) -> Self {
        Self::shared(Arc::new(model))
    }

    pub fn shared(model: Arc<dyn ResourceModel>) -> Self {
        Self {
            model,
            children: BTreeMap::new(),
        }
    }

    /// Nest `node` under the path segment `name`.
    pub fn child(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.children.insert(name.into(), node.into());
        self
    }
}

/// A collection kind and the resource kind of its members.
pub struct CollectionNode {
    model: Arc<dyn CollectionModel>,
    member: ResourceNode,
}

impl CollectionNode {
    pub fn new(model: impl CollectionModel, member: ResourceNode) -> Self {
        Self::shared(Arc::new(model), member)
    }

    pub fn shared(model: Arc<dyn CollectionModel>, member: ResourceNode) -> Self {
        Self { model, member }
    }
}

pub enum Node {
    Resource(ResourceNode),
    Collection(CollectionNode),
}

impl From<ResourceNode> for Node {
    fn from(node: ResourceNode) -> Self {
        Self::Resource(node)
    }
}

impl From<CollectionNode> for Node {
    fn from(node: CollectionNode) -> Self {
        Self::Collection(node)
    }
}

/// What a request path resolves to.
pub enum Target {
    Resource(Resource),
    Collection(Collection),
    Action { resource: Resource, action: String },
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resource(r) | Self::Action { resource: r, .. } => r.kind(),
            Self::Collection(c) => c.kind(),
        }
    }
}

#[derive(Default)]
pub struct Dispatcher {
    roots: BTreeMap<String, Node>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `node` at `/<name>`.
    pub fn mount(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.roots.insert(name.into(), node.into());
        self
    }

    /// Walk `path` against the tree.
    pub fn resolve(&self, path: &str) -> Result<Target, DispatchError> {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .map_err(|_| DispatchError::BadRequest(format!("invalid path segment '{s}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some((first, rest)) = segments.split_first() else {
            return Err(DispatchError::NotFound("no resource at '/'".into()));
        };
        let Some(node) = self.roots.get(first) else {
            return Err(not_found(&format!("/{}", urlencoding::encode(first))));
        };
        walk_node(
            node,
            rest,
            Vec::new(),
            format!("/{}", urlencoding::encode(first)),
        )
    }

    /// Resolve and execute one request.
    pub async fn dispatch(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Reply, DispatchError> {
        match self.resolve(uri.path())? {
            Target::Resource(resource) => resource.handle(method, headers, body).await,
            Target::Collection(collection) => {
                collection.handle(method, uri, headers, body).await
            }
            Target::Action { resource, action } => {
                resource.act(&action, method, headers, body).await
            }
        }
    }

    /// An axum router serving every path through this dispatcher.
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(handle_request)
            .with_state(Arc::new(self))
    }
}

fn not_found(uri: &str) -> DispatchError {
    DispatchError::NotFound(format!("no resource at '{uri}'"))
}

fn walk_node(
    node: &Node,
    segments: &[String],
    mut args: Vec<String>,
    uri: String,
) -> Result<Target, DispatchError> {
    match node {
        Node::Collection(collection) => match segments.split_first() {
            None => Ok(Target::Collection(Collection::new(
                Arc::clone(&collection.model),
                Arc::clone(&collection.member.model),
                args,
                uri,
            ))),
            Some((id, rest)) => {
                let uri = format!("{uri}/{}", urlencoding::encode(id));
                args.push(id.clone());
                walk_resource(&collection.member, rest, args, uri)
            }
        },
        Node::Resource(resource) => walk_resource(resource, segments, args, uri),
    }
}

fn walk_resource(
    node: &ResourceNode,
    segments: &[String],
    args: Vec<String>,
    uri: String,
) -> Result<Target, DispatchError> {
    let Some((name, rest)) = segments.split_first() else {
        return Ok(Target::Resource(Resource::new(
            Arc::clone(&node.model),
            args,
            uri,
        )));
    };
    let child_uri = format!("{uri}/{}", urlencoding::encode(name));
    if let Some(child) = node.children.get(name) {
        return walk_node(child, rest, args, child_uri);
    }
    let resource = Resource::new(Arc::clone(&node.model), args, uri);
    if rest.is_empty() && resource.has_action(name) {
        return Ok(Target::Action {
            resource,
            action: name.clone(),
        });
    }
    Err(not_found(&child_uri))
}

async fn handle_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = info_span!("request", %method, path = uri.path());
    async move {
        match dispatcher.dispatch(&method, &uri, &headers, &body).await {
            Ok(reply) => {
                debug!(status = %reply.status(), "Handled");
                reply.into_response()
            }
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    error!(%status, error = %e, "Request failed");
                } else {
                    debug!(%status, error = %e, "Request rejected");
                }
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}
