//! # Naming Resolver
//!
//! Every model carries a static kind tag (`"vm"`, `"storagevolumes"`, ...).
//! Combined with an [`Operation`] it yields the conventional backend method
//! name, `"<kind>_<operation>"`. The name is what shows up in logs and in the
//! message of a 405 when the backend lacks the capability.

use std::fmt;

/// The operations a dispatcher can ask of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    Lookup,
    Delete,
    Create,
    GetList,
    Update,
    /// A named resource action such as `start` or `enable`.
    Action(&'a str),
}

impl Operation<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Lookup => "lookup",
            Self::Delete => "delete",
            Self::Create => "create",
            Self::GetList => "get_list",
            Self::Update => "update",
            Self::Action(name) => name,
        }
    }
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical tag for a kind: trimmed and lower-cased.
pub fn canonical_kind(kind: &str) -> String {
    kind.trim().to_ascii_lowercase()
}

/// Backend method name for `op` on `kind`, e.g. `vm_lookup`.
pub fn method_name(kind: &str, op: Operation<'_>) -> String {
    format!("{}_{}", canonical_kind(kind), op)
}
