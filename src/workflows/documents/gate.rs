use std::sync::Arc;

use chrono::Utc;

use super::assignments::AssignmentLedger;
use super::audit::AuditRecorder;
use super::domain::{
    ApprovalStatus, Assignment, AuditAction, DocumentId, DocumentVersion, ReviewStatus, UserId,
};
use super::error::ReviewError;
use super::gateways::IdentityProvider;
use super::repository::{ReviewStateUpdate, ReviewStore};
use super::versions::VersionStore;

/// The review-lock state machine for document versions:
/// `active -> under_review -> active`, with `archived` terminal.
///
/// The gate is the only writer of `review_status` and `approval_status`.
/// The lock is a derived effect of having an active assignment; the public
/// `lock`/`unlock` pair exists for administrative holds without one. Every
/// successful transition appends exactly one audit entry after the state
/// mutation.
pub struct ReviewGate<S> {
    versions: Arc<VersionStore<S>>,
    ledger: Arc<AssignmentLedger<S>>,
    audit: Arc<AuditRecorder<S>>,
    identity: Arc<dyn IdentityProvider>,
}

impl<S> ReviewGate<S>
where
    S: ReviewStore,
{
    pub fn new(
        versions: Arc<VersionStore<S>>,
        ledger: Arc<AssignmentLedger<S>>,
        audit: Arc<AuditRecorder<S>>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            versions,
            ledger,
            audit,
            identity,
        }
    }

    /// Administrative hold: `active -> under_review` without an assignment.
    pub fn lock(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        self.lock_inner(document_id, actor, reason, AuditAction::Locked)
    }

    /// Lock taken as the derived effect of a fresh assignment.
    pub(crate) fn lock_for_assignment(
        &self,
        assignment: &Assignment,
    ) -> Result<DocumentVersion, ReviewError> {
        self.lock_inner(
            &assignment.document_id,
            &assignment.assigned_by,
            Some(format!(
                "assigned to {} as {}",
                assignment.assigned_to, assignment.reviewer_role
            )),
            AuditAction::Assigned,
        )
    }

    fn lock_inner(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
        action: AuditAction,
    ) -> Result<DocumentVersion, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        match doc.review_status {
            ReviewStatus::Archived => return Err(ReviewError::DocumentArchived(doc.document_id)),
            ReviewStatus::UnderReview => return Err(ReviewError::AlreadyLocked(doc.document_id)),
            ReviewStatus::Active => {}
        }
        let updated = self.versions.transition_review(
            document_id,
            &[ReviewStatus::Active],
            ReviewStateUpdate {
                review_status: ReviewStatus::UnderReview,
                approval_status: None,
            },
        )?;
        self.audit.record(
            document_id,
            &updated.land_id,
            action,
            ReviewStatus::Active,
            ReviewStatus::UnderReview,
            actor,
            reason,
        )?;
        Ok(updated)
    }

    /// Release a hold: `under_review -> active`, approval untouched.
    /// Refused while an active assignment exists; release the assignment
    /// instead so the derived lock stays consistent.
    pub fn unlock(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        if let Some(active) = self.ledger.active_for(document_id)? {
            return Err(ReviewError::AlreadyAssigned {
                document_id: active.document_id,
                current: ReviewStatus::UnderReview,
            });
        }
        self.unlock_inner(document_id, actor, reason)
    }

    /// Unlock following a completed or cancelled assignment.
    pub(crate) fn unlock_for_release(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        self.unlock_inner(document_id, actor, reason)
    }

    fn unlock_inner(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        if doc.review_status != ReviewStatus::UnderReview {
            return Err(ReviewError::NotUnderReview {
                document_id: doc.document_id,
                current: doc.review_status,
            });
        }
        let updated = self.versions.transition_review(
            document_id,
            &[ReviewStatus::UnderReview],
            ReviewStateUpdate {
                review_status: ReviewStatus::Active,
                approval_status: None,
            },
        )?;
        self.audit.record(
            document_id,
            &updated.land_id,
            AuditAction::Unlocked,
            ReviewStatus::UnderReview,
            ReviewStatus::Active,
            actor,
            reason,
        )?;
        Ok(updated)
    }

    /// Record an approval decision and return the document to `active`.
    pub fn approve(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        self.decide(document_id, actor, reason, ApprovalStatus::Approved)
    }

    /// Record a rejection; a non-empty reason is mandatory.
    pub fn reject(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: &str,
    ) -> Result<DocumentVersion, ReviewError> {
        if reason.trim().is_empty() {
            return Err(ReviewError::ReasonTooShort { min: 1 });
        }
        self.decide(
            document_id,
            actor,
            Some(reason.to_string()),
            ApprovalStatus::Rejected,
        )
    }

    fn decide(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
        decision: ApprovalStatus,
    ) -> Result<DocumentVersion, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        if doc.review_status != ReviewStatus::UnderReview {
            return Err(ReviewError::NotUnderReview {
                document_id: doc.document_id,
                current: doc.review_status,
            });
        }
        let active = self.ledger.active_for(document_id)?;
        self.authorize_decision(active.as_ref(), actor)?;

        // The document transition commits first; losing that race leaves
        // no partial state. The captured assignment is completed after,
        // and the decision is reverted if the completion loses its race.
        let updated = self.versions.transition_review(
            document_id,
            &[ReviewStatus::UnderReview],
            ReviewStateUpdate {
                review_status: ReviewStatus::Active,
                approval_status: Some(decision),
            },
        )?;
        if let Some(active) = active {
            if let Err(err) = self.ledger.complete_for_decision(&active, Utc::now()) {
                if let Err(revert_err) = self.versions.transition_review(
                    document_id,
                    &[ReviewStatus::Active],
                    ReviewStateUpdate {
                        review_status: ReviewStatus::UnderReview,
                        approval_status: Some(doc.approval_status),
                    },
                ) {
                    tracing::error!(
                        document = %document_id,
                        %revert_err,
                        "failed to revert decision after assignment completion loss"
                    );
                }
                return Err(err);
            }
        }
        let action = match decision {
            ApprovalStatus::Approved => AuditAction::Approved,
            _ => AuditAction::Rejected,
        };
        self.audit.record(
            document_id,
            &updated.land_id,
            action,
            ReviewStatus::UnderReview,
            ReviewStatus::Active,
            actor,
            reason,
        )?;
        Ok(updated)
    }

    /// The actor must be the assigned reviewer, or hold the administrator
    /// capability. A document locked administratively (no assignment) can
    /// only be decided by an administrator.
    fn authorize_decision(
        &self,
        active: Option<&Assignment>,
        actor: &UserId,
    ) -> Result<(), ReviewError> {
        if let Some(active) = active {
            if active.assigned_to == *actor {
                return Ok(());
            }
        }
        let is_admin = self
            .identity
            .roles_of(actor)
            .iter()
            .any(|role| role.is_admin());
        if is_admin {
            Ok(())
        } else {
            Err(ReviewError::NotAssignedReviewer(actor.clone()))
        }
    }

    /// Terminal transition; valid from any non-archived state. Cancels a
    /// dangling active assignment in the same operation so the derived
    /// lock cannot outlive its document. `is_latest` is untouched: an
    /// archived version stays "latest" until a replacement is uploaded.
    pub fn archive(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<(DocumentVersion, Option<Assignment>), ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        if doc.review_status == ReviewStatus::Archived {
            return Err(ReviewError::DocumentArchived(doc.document_id));
        }
        let released = self.ledger.release_active(document_id, Utc::now())?;
        let updated = self.versions.transition_review(
            document_id,
            &[ReviewStatus::Active, ReviewStatus::UnderReview],
            ReviewStateUpdate {
                review_status: ReviewStatus::Archived,
                approval_status: None,
            },
        )?;
        self.audit.record(
            document_id,
            &updated.land_id,
            AuditAction::Archived,
            doc.review_status,
            ReviewStatus::Archived,
            actor,
            reason,
        )?;
        Ok((updated, released))
    }
}
