use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApprovalStatus, Assignment, AssignmentId, AssignmentStatus, AuditAction, AuditEntry,
    ContentRef, DocumentId, DocumentVersion, LandId, ReviewStatus, ReviewerRole, UserId,
};

/// Error enumeration for backing-store failures.
///
/// `Conflict` is the store's uniqueness guarantee speaking: a second active
/// assignment for a document, a lost latest-pointer race, or a
/// compare-and-swap transition whose precondition no longer holds.
/// `Serialization` marks a transient failure the engine retries once.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store constraint violated")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("transient serialization failure: {0}")]
    Serialization(String),
}

/// Retry a store operation once on a transient serialization failure.
pub(crate) fn retry_once<T>(
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    match op() {
        Err(StoreError::Serialization(reason)) => {
            tracing::debug!(%reason, "retrying store operation after serialization failure");
            op()
        }
        other => other,
    }
}

/// Version fields supplied by the caller; the store assigns
/// `version_number`, the parent link, and the latest pointer atomically.
#[derive(Debug, Clone)]
pub struct NewVersionRecord {
    pub document_id: DocumentId,
    pub land_id: LandId,
    pub document_type: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_by: UserId,
    pub content_ref: ContentRef,
    pub created_at: DateTime<Utc>,
}

/// Target state for a review transition; `approval_status` is left
/// untouched when `None`.
#[derive(Debug, Clone, Copy)]
pub struct ReviewStateUpdate {
    pub review_status: ReviewStatus,
    pub approval_status: Option<ApprovalStatus>,
}

/// Storage abstraction for the version lineage.
pub trait VersionRepository: Send + Sync {
    /// Append a version to its `(land, document type)` group in one atomic
    /// operation: `version_number = max + 1`, prior latest demoted, new row
    /// marked latest. Returns `Conflict` when a concurrent append for the
    /// same group wins the race.
    fn append(&self, record: NewVersionRecord) -> Result<DocumentVersion, StoreError>;
    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, StoreError>;
    fn latest(&self, land: &LandId, doc_type: &str) -> Result<Option<DocumentVersion>, StoreError>;
    /// Full lineage for a group, newest first.
    fn lineage(&self, land: &LandId, doc_type: &str) -> Result<Vec<DocumentVersion>, StoreError>;
    fn for_land(&self, land: &LandId) -> Result<Vec<DocumentVersion>, StoreError>;
    /// Compare-and-swap review transition: fails with `Conflict` when the
    /// current `review_status` is not in `allowed_from`.
    fn transition_review(
        &self,
        id: &DocumentId,
        allowed_from: &[ReviewStatus],
        update: ReviewStateUpdate,
    ) -> Result<DocumentVersion, StoreError>;
}

/// Storage abstraction for the assignment ledger.
pub trait AssignmentRepository: Send + Sync {
    /// Insert a new assignment, enforcing "at most one active assignment
    /// per document" as a store constraint. Returns `Conflict` when an
    /// assignment in `assigned`/`in_progress` already exists for the
    /// document.
    fn insert_active(&self, assignment: Assignment) -> Result<Assignment, StoreError>;
    fn fetch(&self, id: &AssignmentId) -> Result<Option<Assignment>, StoreError>;
    fn active_for(&self, document: &DocumentId) -> Result<Option<Assignment>, StoreError>;
    /// Compare-and-swap status transition; timestamps are maintained by the
    /// store (`started_at` on `in_progress`, `completed_at` on
    /// `completed`/`cancelled`).
    fn transition(
        &self,
        id: &AssignmentId,
        allowed_from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError>;
    fn for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, StoreError>;
}

/// Storage abstraction for per-land visibility overrides.
pub trait VisibilityRepository: Send + Sync {
    fn project_override(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Option<BTreeSet<ReviewerRole>>, StoreError>;
    /// Replace the full override set for a land in one atomic operation.
    fn replace_overrides(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), StoreError>;
}

/// Storage abstraction for the append-only audit trail.
pub trait AuditRepository: Send + Sync {
    fn append_audit(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError>;
    fn audit_for_land(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: &Pagination,
    ) -> Result<AuditPage, StoreError>;
}

/// The four logical tables behind the engine, usually one database.
pub trait ReviewStore:
    VersionRepository + AssignmentRepository + VisibilityRepository + AuditRepository
{
}

impl<T> ReviewStore for T where
    T: VersionRepository + AssignmentRepository + VisibilityRepository + AuditRepository
{
}

/// Optional constraints on an audit trail query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub document_id: Option<DocumentId>,
    pub changed_by: Option<UserId>,
}

/// Offset/limit window; offsets make the sequence restartable.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of the audit trail, newest entries first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}
