use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, DocumentId, ReviewStatus, UserId,
};
use super::error::ReviewError;
use super::policy::ReviewPolicy;
use super::repository::{retry_once, AssignmentRepository, StoreError};

const ACTIVE_STATUSES: [AssignmentStatus; 2] =
    [AssignmentStatus::Assigned, AssignmentStatus::InProgress];

/// Ledger of reviewer assignments.
///
/// The "at most one active assignment per document" invariant is enforced
/// by the store's uniqueness guarantee on insert, so concurrent assignment
/// requests resolve to exactly one winner regardless of interleaving.
pub struct AssignmentLedger<S> {
    store: Arc<S>,
    policy: ReviewPolicy,
}

impl<S> AssignmentLedger<S>
where
    S: AssignmentRepository,
{
    pub fn new(store: Arc<S>, policy: ReviewPolicy) -> Self {
        Self { store, policy }
    }

    /// Record a new active assignment. The caller has already validated
    /// the reviewer identity and role visibility.
    pub(crate) fn create(&self, assignment: Assignment) -> Result<Assignment, ReviewError> {
        let document_id = assignment.document_id.clone();
        retry_once(|| self.store.insert_active(assignment.clone())).map_err(|err| match err {
            // An active assignment implies the document is locked.
            StoreError::Conflict => ReviewError::AlreadyAssigned {
                document_id: document_id.clone(),
                current: ReviewStatus::UnderReview,
            },
            other => ReviewError::Store(other),
        })
    }

    /// Apply one step of the assignment lifecycle. Valid transitions:
    /// `assigned -> in_progress`, `assigned|in_progress -> completed`,
    /// `assigned|in_progress -> cancelled`.
    pub fn update_status(
        &self,
        id: &AssignmentId,
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Assignment, ReviewError> {
        let current = self
            .store
            .fetch(id)?
            .ok_or_else(|| ReviewError::AssignmentNotFound(id.clone()))?;
        if !valid_transition(current.status, to) {
            return Err(ReviewError::InvalidTransition {
                from: current.status,
                to,
            });
        }
        retry_once(|| self.store.transition(id, &[current.status], to, at)).map_err(|err| {
            match err {
                StoreError::Conflict => ReviewError::Conflict(current.document_id.clone()),
                StoreError::NotFound => ReviewError::NotFound(current.document_id.clone()),
                other => ReviewError::Store(other),
            }
        })
    }

    /// Cancellation requires a substantive reason, mirroring the
    /// withdrawal-reason rule used elsewhere on the platform.
    pub fn cancel(
        &self,
        id: &AssignmentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Assignment, ReviewError> {
        if reason.trim().chars().count() < self.policy.min_reason_len {
            return Err(ReviewError::ReasonTooShort {
                min: self.policy.min_reason_len,
            });
        }
        self.update_status(id, AssignmentStatus::Cancelled, at)
    }

    pub fn active_for(&self, document: &DocumentId) -> Result<Option<Assignment>, ReviewError> {
        Ok(self.store.active_for(document)?)
    }

    pub fn for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, ReviewError> {
        Ok(self.store.for_reviewer(reviewer, status)?)
    }

    /// Complete a specific assignment as part of an approve/reject
    /// decision. The caller captures the active assignment before the
    /// document transition, so a concurrent release surfaces as
    /// `Conflict` here rather than silently completing a different row.
    pub(crate) fn complete_for_decision(
        &self,
        assignment: &Assignment,
        at: DateTime<Utc>,
    ) -> Result<Assignment, ReviewError> {
        retry_once(|| {
            self.store.transition(
                &assignment.assignment_id,
                &ACTIVE_STATUSES,
                AssignmentStatus::Completed,
                at,
            )
        })
        .map_err(|err| match err {
            StoreError::Conflict => ReviewError::Conflict(assignment.document_id.clone()),
            other => ReviewError::Store(other),
        })
    }

    /// Cancel the active assignment on an internal release path (archive
    /// of the document, or rollback of a failed lock). Exempt from the
    /// reason-length rule.
    pub(crate) fn release_active(
        &self,
        document: &DocumentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Assignment>, ReviewError> {
        match self.store.active_for(document)? {
            Some(active) => {
                let cancelled = retry_once(|| {
                    self.store.transition(
                        &active.assignment_id,
                        &ACTIVE_STATUSES,
                        AssignmentStatus::Cancelled,
                        at,
                    )
                })
                .map_err(|err| match err {
                    StoreError::Conflict => ReviewError::Conflict(document.clone()),
                    other => ReviewError::Store(other),
                })?;
                Ok(Some(cancelled))
            }
            None => Ok(None),
        }
    }
}

const fn valid_transition(from: AssignmentStatus, to: AssignmentStatus) -> bool {
    matches!(
        (from, to),
        (AssignmentStatus::Assigned, AssignmentStatus::InProgress)
            | (
                AssignmentStatus::Assigned | AssignmentStatus::InProgress,
                AssignmentStatus::Completed | AssignmentStatus::Cancelled,
            )
    )
}
