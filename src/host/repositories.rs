//! `/host/repositories`, persisted in the object store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use resource_framework::entity::{optional_bool, optional_str, required_str, to_json};
use resource_framework::store::{get_as, put_as, put_new_as};
use resource_framework::{
    ActionOutcome, Actionable, CollectionModel, Created, Creatable, Deletable, Listable,
    Lookupable, ModelError, ObjectStore, Params, ResourceModel, Updatable,
};
use serde_json::Value;
use tracing::info;

use crate::model::Repository;

pub const NAMESPACE: &str = "repository";

fn repo_id(ident: &[String]) -> Result<&str, ModelError> {
    match ident {
        [id] => Ok(id.as_str()),
        _ => Err(ModelError::NotFound("repository not found".into())),
    }
}

fn load(store: &dyn ObjectStore, id: &str) -> Result<Repository, ModelError> {
    get_as::<Repository>(store, NAMESPACE, id)?
        .ok_or_else(|| ModelError::NotFound(format!("repository '{id}' not found")))
}

fn generated_base() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("repo_{secs}")
}

fn already_exists(id: &str) -> ModelError {
    ModelError::invalid("repo_id", format!("repository '{id}' already exists"))
}

pub struct RepositoriesModel {
    store: Arc<dyn ObjectStore>,
}

impl RepositoriesModel {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Listable for RepositoriesModel {
    async fn get_list(&self, _parent: &[String]) -> Result<Vec<String>, ModelError> {
        Ok(self.store.list(NAMESPACE)?)
    }
}

#[async_trait]
impl Creatable for RepositoriesModel {
    async fn create(&self, _parent: &[String], params: Params) -> Result<Created, ModelError> {
        let baseurl = required_str(&params, "baseurl")?;
        let requested = optional_str(&params, "repo_id")?;
        let repo_name = optional_str(&params, "repo_name")?;
        let gpgkey = optional_str(&params, "gpgkey")?;
        let mut repo = Repository {
            repo_id: String::new(),
            repo_name: String::new(),
            baseurl,
            is_mirror: optional_bool(&params, "is_mirror")?.unwrap_or(false),
            enabled: optional_bool(&params, "enabled")?.unwrap_or(true),
            gpgcheck: gpgkey.is_some(),
            gpgkey,
        };

        // Same-second creations get a numeric suffix.
        let base = requested.clone().unwrap_or_else(generated_base);
        let mut n = 0;
        loop {
            repo.repo_id = match n {
                0 => base.clone(),
                n => format!("{base}_{n}"),
            };
            repo.repo_name = repo_name.clone().unwrap_or_else(|| repo.repo_id.clone());
            if put_new_as(self.store.as_ref(), NAMESPACE, &repo.repo_id, &repo)? {
                break;
            }
            if requested.is_some() {
                return Err(already_exists(&base));
            }
            n += 1;
        }
        let id = repo.repo_id;
        info!(repo_id = %id, "Repository added");
        Ok(Created::Resource(id))
    }
}

impl CollectionModel for RepositoriesModel {
    fn kind(&self) -> &'static str {
        "repositories"
    }

    fn as_listable(&self) -> Option<&dyn Listable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }
}

pub struct RepositoryModel {
    store: Arc<dyn ObjectStore>,
}

impl RepositoryModel {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Lookupable for RepositoryModel {
    async fn lookup(&self, ident: &[String]) -> Result<Value, ModelError> {
        to_json(&load(self.store.as_ref(), repo_id(ident)?)?)
    }
}

#[async_trait]
impl Deletable for RepositoryModel {
    async fn delete(&self, ident: &[String]) -> Result<(), ModelError> {
        let id = repo_id(ident)?;
        if !self.store.delete(NAMESPACE, id)? {
            return Err(ModelError::NotFound(format!("repository '{id}' not found")));
        }
        info!(repo_id = %id, "Repository removed");
        Ok(())
    }
}

#[async_trait]
impl Updatable for RepositoryModel {
    async fn update(&self, ident: &[String], params: Params) -> Result<String, ModelError> {
        let id = repo_id(ident)?;
        let mut repo = load(self.store.as_ref(), id)?;

        if let Some(name) = optional_str(&params, "repo_name")? {
            repo.repo_name = name;
        }
        if let Some(url) = optional_str(&params, "baseurl")? {
            repo.baseurl = url;
        }
        if let Some(is_mirror) = optional_bool(&params, "is_mirror")? {
            repo.is_mirror = is_mirror;
        }
        if let Some(key) = optional_str(&params, "gpgkey")? {
            repo.gpgkey = Some(key);
        }
        repo.gpgcheck = optional_bool(&params, "gpgcheck")?.unwrap_or(repo.gpgkey.is_some());

        let new_id = optional_str(&params, "repo_id")?.unwrap_or_else(|| id.to_string());
        if new_id == id {
            put_as(self.store.as_ref(), NAMESPACE, id, &repo)?;
            return Ok(new_id);
        }
        repo.repo_id = new_id.clone();
        if !put_new_as(self.store.as_ref(), NAMESPACE, &new_id, &repo)? {
            return Err(already_exists(&new_id));
        }
        self.store.delete(NAMESPACE, id)?;
        info!(from = %id, to = %new_id, "Repository renamed");
        Ok(new_id)
    }
}

#[async_trait]
impl Actionable for RepositoryModel {
    fn actions(&self) -> &[&'static str] {
        &["enable", "disable"]
    }

    async fn act(
        &self,
        ident: &[String],
        action: &str,
        _params: Params,
    ) -> Result<ActionOutcome, ModelError> {
        let id = repo_id(ident)?;
        let enable = match action {
            "enable" => true,
            "disable" => false,
            other => {
                return Err(ModelError::InvalidOperation(format!(
                    "unknown repository action '{other}'"
                )))
            }
        };
        let mut repo = load(self.store.as_ref(), id)?;
        if repo.enabled == enable {
            return Err(ModelError::OperationFailed(format!(
                "repository '{id}' is already {action}d"
            )));
        }
        repo.enabled = enable;
        put_as(self.store.as_ref(), NAMESPACE, id, &repo)?;
        info!(repo_id = %id, enabled = enable, "Repository toggled");
        Ok(ActionOutcome::Done)
    }
}

impl ResourceModel for RepositoryModel {
    fn kind(&self) -> &'static str {
        "repository"
    }

    fn as_lookupable(&self) -> Option<&dyn Lookupable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }

    fn as_actionable(&self) -> Option<&dyn Actionable> {
        Some(self)
    }
}
