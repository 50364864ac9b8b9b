//! In-memory table shared by a collection backend and its member backend.
//!
//! Every mutation runs under the write lock and completes before the lock is
//! released, so concurrent requests see each record either before or after a
//! change, never halfway.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use resource_framework::ModelError;

#[derive(Debug)]
pub struct Inventory<T> {
    kind: &'static str,
    items: RwLock<BTreeMap<String, T>>,
}

impl<T: Clone> Inventory<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn not_found(&self, name: &str) -> ModelError {
        ModelError::NotFound(format!("{} '{name}' not found", self.kind))
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Names of the records `keep` accepts, in sorted order.
    pub fn names_where(&self, keep: impl Fn(&T) -> bool) -> Vec<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, item)| keep(item))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<T, ModelError> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    /// Insert under a name that must not be taken yet.
    pub fn insert_new(&self, name: &str, item: T) -> Result<(), ModelError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.contains_key(name) {
            return Err(ModelError::invalid(
                "name",
                format!("{} '{name}' already exists", self.kind),
            ));
        }
        items.insert(name.to_string(), item);
        Ok(())
    }

    /// Apply `f` to the named record. Nothing is written when `f` fails.
    pub fn modify<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut T) -> Result<R, ModelError>,
    ) -> Result<R, ModelError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let current = items.get(name).ok_or_else(|| self.not_found(name))?;
        let mut draft = current.clone();
        let out = f(&mut draft)?;
        items.insert(name.to_string(), draft);
        Ok(out)
    }

    /// Remove the named record if `check` accepts it.
    pub fn remove_if(
        &self,
        name: &str,
        check: impl FnOnce(&T) -> Result<(), ModelError>,
    ) -> Result<T, ModelError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        check(items.get(name).ok_or_else(|| self.not_found(name))?)?;
        items.remove(name).ok_or_else(|| self.not_found(name))
    }

    /// Move a record to a new name after `f` has updated it.
    pub fn rename(
        &self,
        old: &str,
        new: &str,
        f: impl FnOnce(&mut T) -> Result<(), ModelError>,
    ) -> Result<(), ModelError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if old != new && items.contains_key(new) {
            return Err(ModelError::invalid(
                "name",
                format!("{} '{new}' already exists", self.kind),
            ));
        }
        let mut draft = items.get(old).ok_or_else(|| self.not_found(old))?.clone();
        f(&mut draft)?;
        items.remove(old);
        items.insert(new.to_string(), draft);
        Ok(())
    }
}
