use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::domain::{LandId, ReviewerRole};
use super::error::ReviewError;
use super::repository::{retry_once, VisibilityRepository};

/// Resolves which reviewer roles may see or act on a document type for a
/// land, layering per-project overrides over the global defaults.
pub struct RoleVisibilityResolver<S> {
    store: Arc<S>,
    defaults: BTreeMap<String, BTreeSet<ReviewerRole>>,
}

impl<S> RoleVisibilityResolver<S>
where
    S: VisibilityRepository,
{
    pub fn new(store: Arc<S>, defaults: BTreeMap<String, BTreeSet<ReviewerRole>>) -> Self {
        Self { store, defaults }
    }

    /// Project override when present and non-empty, else the global
    /// default, else the empty set.
    pub fn resolve(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<BTreeSet<ReviewerRole>, ReviewError> {
        if let Some(roles) = self.store.project_override(land, doc_type)? {
            if !roles.is_empty() {
                return Ok(roles);
            }
        }
        Ok(self.defaults.get(doc_type).cloned().unwrap_or_default())
    }

    /// An unmapped document type is visible only to the administrator
    /// capability, never to reviewer roles.
    pub fn may_review(
        &self,
        land: &LandId,
        doc_type: &str,
        role: &ReviewerRole,
    ) -> Result<bool, ReviewError> {
        if role.is_admin() {
            return Ok(true);
        }
        Ok(self.resolve(land, doc_type)?.contains(role))
    }

    /// Replace the full override set for a land. Replace-all semantics: the
    /// caller always knows the complete resulting state.
    pub fn set_project_override(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), ReviewError> {
        retry_once(|| self.store.replace_overrides(land, mapping.clone()))?;
        Ok(())
    }

    pub fn default_types(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }
}
