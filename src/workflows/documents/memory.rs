//! In-memory reference backend.
//!
//! Each trait method runs to completion under one lock, which is the
//! transactional boundary the engine relies on: check-and-write never
//! spans two lock acquisitions, so the uniqueness guarantees behave like
//! the partial unique indexes a relational backend would use.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::domain::{
    ApprovalStatus, Assignment, AssignmentId, AssignmentStatus, AuditEntry, DocumentId,
    DocumentVersion, LandId, ReviewStatus, ReviewerRole, UserId,
};
use super::repository::{
    AssignmentRepository, AuditFilter, AuditPage, AuditRepository, NewVersionRecord, Pagination,
    ReviewStateUpdate, StoreError, VersionRepository, VisibilityRepository,
};

#[derive(Default)]
struct MemoryState {
    versions: HashMap<DocumentId, DocumentVersion>,
    assignments: HashMap<AssignmentId, Assignment>,
    overrides: HashMap<LandId, BTreeMap<String, BTreeSet<ReviewerRole>>>,
    audit: Vec<AuditEntry>,
}

/// Reference [`super::repository::ReviewStore`] used by tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("store mutex poisoned")
    }
}

impl VersionRepository for MemoryStore {
    fn append(&self, record: NewVersionRecord) -> Result<DocumentVersion, StoreError> {
        let mut state = self.lock();
        if state.versions.contains_key(&record.document_id) {
            return Err(StoreError::Conflict);
        }

        let mut max_number = 0;
        let mut parent = None;
        for version in state.versions.values_mut() {
            if version.land_id != record.land_id || version.document_type != record.document_type {
                continue;
            }
            max_number = max_number.max(version.version_number);
            if version.is_latest {
                parent = Some(version.document_id.clone());
                version.is_latest = false;
            }
        }

        let version = DocumentVersion {
            document_id: record.document_id.clone(),
            land_id: record.land_id,
            document_type: record.document_type,
            version_number: max_number + 1,
            parent_document_id: parent,
            file_name: record.file_name,
            mime_type: record.mime_type,
            size: record.size,
            uploaded_by: record.uploaded_by,
            created_at: record.created_at,
            content_ref: record.content_ref,
            approval_status: ApprovalStatus::Pending,
            review_status: ReviewStatus::Active,
            is_latest: true,
        };
        state
            .versions
            .insert(record.document_id, version.clone());
        Ok(version)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, StoreError> {
        Ok(self.lock().versions.get(id).cloned())
    }

    fn latest(&self, land: &LandId, doc_type: &str) -> Result<Option<DocumentVersion>, StoreError> {
        Ok(self
            .lock()
            .versions
            .values()
            .find(|version| {
                version.is_latest
                    && version.land_id == *land
                    && version.document_type == doc_type
            })
            .cloned())
    }

    fn lineage(&self, land: &LandId, doc_type: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        let mut versions: Vec<DocumentVersion> = self
            .lock()
            .versions
            .values()
            .filter(|version| version.land_id == *land && version.document_type == doc_type)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    fn for_land(&self, land: &LandId) -> Result<Vec<DocumentVersion>, StoreError> {
        let mut versions: Vec<DocumentVersion> = self
            .lock()
            .versions
            .values()
            .filter(|version| version.land_id == *land)
            .cloned()
            .collect();
        versions.sort_by(|a, b| {
            a.document_type
                .cmp(&b.document_type)
                .then(b.version_number.cmp(&a.version_number))
        });
        Ok(versions)
    }

    fn transition_review(
        &self,
        id: &DocumentId,
        allowed_from: &[ReviewStatus],
        update: ReviewStateUpdate,
    ) -> Result<DocumentVersion, StoreError> {
        let mut state = self.lock();
        let version = state.versions.get_mut(id).ok_or(StoreError::NotFound)?;
        if !allowed_from.contains(&version.review_status) {
            return Err(StoreError::Conflict);
        }
        version.review_status = update.review_status;
        if let Some(approval) = update.approval_status {
            version.approval_status = approval;
        }
        Ok(version.clone())
    }
}

impl AssignmentRepository for MemoryStore {
    fn insert_active(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        let mut state = self.lock();
        if state.assignments.contains_key(&assignment.assignment_id) {
            return Err(StoreError::Conflict);
        }
        let already_active = state
            .assignments
            .values()
            .any(|existing| {
                existing.document_id == assignment.document_id && existing.status.is_active()
            });
        if already_active {
            return Err(StoreError::Conflict);
        }
        state
            .assignments
            .insert(assignment.assignment_id.clone(), assignment.clone());
        Ok(assignment)
    }

    fn fetch(&self, id: &AssignmentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self.lock().assignments.get(id).cloned())
    }

    fn active_for(&self, document: &DocumentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .lock()
            .assignments
            .values()
            .find(|assignment| assignment.document_id == *document && assignment.status.is_active())
            .cloned())
    }

    fn transition(
        &self,
        id: &AssignmentId,
        allowed_from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError> {
        let mut state = self.lock();
        let assignment = state.assignments.get_mut(id).ok_or(StoreError::NotFound)?;
        if !allowed_from.contains(&assignment.status) {
            return Err(StoreError::Conflict);
        }
        assignment.status = to;
        match to {
            AssignmentStatus::InProgress => assignment.started_at = Some(at),
            AssignmentStatus::Completed | AssignmentStatus::Cancelled => {
                assignment.completed_at = Some(at)
            }
            AssignmentStatus::Assigned => {}
        }
        Ok(assignment.clone())
    }

    fn for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, StoreError> {
        let mut assignments: Vec<Assignment> = self
            .lock()
            .assignments
            .values()
            .filter(|assignment| {
                assignment.assigned_to == *reviewer
                    && status.map_or(true, |wanted| assignment.status == wanted)
            })
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(assignments)
    }
}

impl VisibilityRepository for MemoryStore {
    fn project_override(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Option<BTreeSet<ReviewerRole>>, StoreError> {
        Ok(self
            .lock()
            .overrides
            .get(land)
            .and_then(|mapping| mapping.get(doc_type))
            .cloned())
    }

    fn replace_overrides(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), StoreError> {
        self.lock().overrides.insert(land.clone(), mapping);
        Ok(())
    }
}

impl AuditRepository for MemoryStore {
    fn append_audit(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        self.lock().audit.push(entry.clone());
        Ok(entry)
    }

    fn audit_for_land(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: &Pagination,
    ) -> Result<AuditPage, StoreError> {
        let state = self.lock();
        let matching: Vec<AuditEntry> = state
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.land_id == *land)
            .filter(|entry| filter.action.map_or(true, |action| entry.action == action))
            .filter(|entry| {
                filter
                    .document_id
                    .as_ref()
                    .map_or(true, |id| entry.document_id == *id)
            })
            .filter(|entry| {
                filter
                    .changed_by
                    .as_ref()
                    .map_or(true, |actor| entry.changed_by == *actor)
            })
            .cloned()
            .collect();

        let total = matching.len();
        let entries = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Ok(AuditPage {
            entries,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}
