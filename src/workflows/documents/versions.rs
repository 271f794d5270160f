use std::sync::Arc;

use super::domain::{DocumentId, DocumentVersion, LandId};
use super::error::ReviewError;
use super::repository::{
    retry_once, NewVersionRecord, ReviewStateUpdate, StoreError, VersionRepository,
};

/// Maintains the version lineage and the latest-pointer invariant for each
/// `(land, document type)` group.
///
/// Review-state writes on versions belong to the review gate; this store
/// only exposes them crate-internally.
pub struct VersionStore<S> {
    store: Arc<S>,
}

impl<S> VersionStore<S>
where
    S: VersionRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append the next version: number `max + 1`, latest pointer moved in
    /// the same store operation. A lost race against a concurrent upload
    /// for the same group surfaces as [`ReviewError::Conflict`].
    pub fn create_version(
        &self,
        record: NewVersionRecord,
    ) -> Result<DocumentVersion, ReviewError> {
        let document_id = record.document_id.clone();
        retry_once(|| self.store.append(record.clone())).map_err(|err| match err {
            StoreError::Conflict => ReviewError::Conflict(document_id.clone()),
            other => ReviewError::Store(other),
        })
    }

    pub fn fetch(&self, id: &DocumentId) -> Result<DocumentVersion, ReviewError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| ReviewError::NotFound(id.clone()))
    }

    pub fn get_latest(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<DocumentVersion, ReviewError> {
        self.store
            .latest(land, doc_type)?
            .ok_or_else(|| ReviewError::NotFound(DocumentId(format!("{land}/{doc_type}/latest"))))
    }

    /// Lineage for a group, newest first.
    pub fn list_versions(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Vec<DocumentVersion>, ReviewError> {
        Ok(self.store.lineage(land, doc_type)?)
    }

    pub fn list_for_land(&self, land: &LandId) -> Result<Vec<DocumentVersion>, ReviewError> {
        Ok(self.store.for_land(land)?)
    }

    /// Compare-and-swap review transition used by the gate. A `Conflict`
    /// from the store means a concurrent writer moved the document first.
    pub(crate) fn transition_review(
        &self,
        id: &DocumentId,
        allowed_from: &[super::domain::ReviewStatus],
        update: ReviewStateUpdate,
    ) -> Result<DocumentVersion, ReviewError> {
        retry_once(|| self.store.transition_review(id, allowed_from, update)).map_err(|err| {
            match err {
                StoreError::Conflict => ReviewError::Conflict(id.clone()),
                StoreError::NotFound => ReviewError::NotFound(id.clone()),
                other => ReviewError::Store(other),
            }
        })
    }
}
