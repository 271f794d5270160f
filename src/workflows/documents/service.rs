use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};

use super::assignments::AssignmentLedger;
use super::audit::AuditRecorder;
use super::domain::{
    ApprovalStatus, Assignment, AssignmentId, AssignmentRequest, AssignmentStatus, AuditAction,
    DocumentId, DocumentStatusView, DocumentVersion, LandId, PublicationStatus, ReviewStatus,
    ReviewerRole, UploadRequest, UserId,
};
use super::error::ReviewError;
use super::gate::ReviewGate;
use super::gateways::{BlobStore, IdentityProvider, LandStatusGateway};
use super::outbox::{EventPublisher, Outbox, ReviewEvent};
use super::policy::ReviewPolicy;
use super::repository::{AuditFilter, AuditPage, NewVersionRecord, Pagination, ReviewStore};
use super::versions::VersionStore;
use super::visibility::RoleVisibilityResolver;

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ASSIGNMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

fn next_assignment_id() -> AssignmentId {
    let id = ASSIGNMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssignmentId(format!("asg-{id:06}"))
}

/// Facade composing the version store, visibility resolver, assignment
/// ledger, review gate, audit recorder, and the post-commit outbox. This
/// is the surface the rest of the platform consumes.
pub struct DocumentReviewService<S, P> {
    versions: Arc<VersionStore<S>>,
    resolver: RoleVisibilityResolver<S>,
    ledger: Arc<AssignmentLedger<S>>,
    gate: ReviewGate<S>,
    audit: Arc<AuditRecorder<S>>,
    outbox: Arc<Outbox<P>>,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
    land_status: Arc<dyn LandStatusGateway>,
    policy: ReviewPolicy,
}

impl<S, P> DocumentReviewService<S, P>
where
    S: ReviewStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        publisher: Arc<P>,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
        land_status: Arc<dyn LandStatusGateway>,
        default_visibility: BTreeMap<String, BTreeSet<ReviewerRole>>,
        policy: ReviewPolicy,
    ) -> Self {
        let versions = Arc::new(VersionStore::new(store.clone()));
        let resolver = RoleVisibilityResolver::new(store.clone(), default_visibility);
        let ledger = Arc::new(AssignmentLedger::new(store.clone(), policy.clone()));
        let audit = Arc::new(AuditRecorder::new(store, policy.clone()));
        let gate = ReviewGate::new(
            versions.clone(),
            ledger.clone(),
            audit.clone(),
            identity.clone(),
        );
        let outbox = Arc::new(Outbox::new(publisher, policy.outbox_max_attempts));
        Self {
            versions,
            resolver,
            ledger,
            gate,
            audit,
            outbox,
            identity,
            blobs,
            land_status,
            policy,
        }
    }

    /// Store the payload with the blob collaborator and append the next
    /// version in its lineage.
    pub fn upload_document(&self, request: UploadRequest) -> Result<DocumentVersion, ReviewError> {
        let content_ref = self.blobs.put(&request.bytes)?;
        let record = NewVersionRecord {
            document_id: next_document_id(),
            land_id: request.land_id,
            document_type: request.document_type,
            file_name: request.file_name,
            mime_type: request.mime_type,
            size: request.bytes.len() as u64,
            uploaded_by: request.uploaded_by,
            content_ref,
            created_at: Utc::now(),
        };
        self.versions.create_version(record)
    }

    /// Bytes behind a stored version, fetched from the blob collaborator.
    pub fn fetch_content(&self, document_id: &DocumentId) -> Result<Vec<u8>, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        Ok(self.blobs.get(&doc.content_ref)?)
    }

    /// Assign a reviewer and lock the version in one operation.
    pub fn assign_document(
        &self,
        document_id: &DocumentId,
        reviewer: UserId,
        role: ReviewerRole,
        assigned_by: UserId,
        opts: AssignmentRequest,
    ) -> Result<Assignment, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        if doc.review_status == ReviewStatus::Archived {
            return Err(ReviewError::DocumentArchived(doc.document_id));
        }
        if !self.identity.is_active_user(&reviewer) {
            return Err(ReviewError::UnknownReviewer(reviewer));
        }
        if !self
            .resolver
            .may_review(&doc.land_id, &doc.document_type, &role)?
        {
            return Err(ReviewError::RoleMismatch {
                role,
                document_type: doc.document_type,
            });
        }
        self.check_rejection_cooldown(&doc)?;

        let assignment = self.ledger.create(Assignment {
            assignment_id: next_assignment_id(),
            document_id: doc.document_id.clone(),
            land_id: doc.land_id.clone(),
            assigned_to: reviewer,
            assigned_by,
            reviewer_role: role,
            status: AssignmentStatus::Assigned,
            priority: opts.priority,
            due_date: opts.due_date,
            notes: opts.notes,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })?;

        if let Err(err) = self.gate.lock_for_assignment(&assignment) {
            // Roll the ledger row back so a failed lock leaves no partial
            // state behind.
            if let Err(rollback_err) = self.ledger.release_active(document_id, Utc::now()) {
                tracing::error!(
                    document = %document_id,
                    %rollback_err,
                    "failed to roll back assignment after lock failure"
                );
            }
            return Err(err);
        }

        self.outbox.enqueue(ReviewEvent::ReviewerAssigned {
            document_id: assignment.document_id.clone(),
            land_id: assignment.land_id.clone(),
            reviewer: assignment.assigned_to.clone(),
            role: assignment.reviewer_role.clone(),
        });
        self.outbox.flush();
        Ok(assignment)
    }

    /// Step an assignment through its lifecycle; completion or
    /// cancellation releases the document lock.
    pub fn update_assignment_status(
        &self,
        assignment_id: &AssignmentId,
        to: AssignmentStatus,
        actor: &UserId,
    ) -> Result<Assignment, ReviewError> {
        let assignment = self.ledger.update_status(assignment_id, to, Utc::now())?;
        if !assignment.status.is_active() {
            self.gate
                .unlock_for_release(&assignment.document_id, actor, None)?;
            self.outbox.enqueue(ReviewEvent::AssignmentReleased {
                assignment_id: assignment.assignment_id.clone(),
                document_id: assignment.document_id.clone(),
                status: assignment.status,
            });
        }
        self.outbox.flush();
        Ok(assignment)
    }

    /// Cancel an assignment with a mandatory reason; unlocks the document.
    pub fn cancel_assignment(
        &self,
        assignment_id: &AssignmentId,
        reason: &str,
        actor: &UserId,
    ) -> Result<Assignment, ReviewError> {
        let assignment = self.ledger.cancel(assignment_id, reason, Utc::now())?;
        self.gate.unlock_for_release(
            &assignment.document_id,
            actor,
            Some(reason.to_string()),
        )?;
        self.outbox.enqueue(ReviewEvent::AssignmentReleased {
            assignment_id: assignment.assignment_id.clone(),
            document_id: assignment.document_id.clone(),
            status: assignment.status,
        });
        self.outbox.flush();
        Ok(assignment)
    }

    pub fn assignments_for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, ReviewError> {
        self.ledger.for_reviewer(reviewer, status)
    }

    /// Approve the version under review; fires the all-documents-approved
    /// callback when this approval completes the land's mapped set.
    pub fn approve_version(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        let doc = self.gate.approve(document_id, actor, reason)?;
        self.outbox.enqueue(ReviewEvent::DecisionRecorded {
            document_id: doc.document_id.clone(),
            land_id: doc.land_id.clone(),
            decision: ApprovalStatus::Approved,
            actor: actor.clone(),
        });
        self.enqueue_if_set_complete(&doc.land_id)?;
        self.outbox.flush();
        Ok(doc)
    }

    /// Reject the version under review; the reason is mandatory.
    pub fn reject_version(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: &str,
    ) -> Result<DocumentVersion, ReviewError> {
        let doc = self.gate.reject(document_id, actor, reason)?;
        self.outbox.enqueue(ReviewEvent::DecisionRecorded {
            document_id: doc.document_id.clone(),
            land_id: doc.land_id.clone(),
            decision: ApprovalStatus::Rejected,
            actor: actor.clone(),
        });
        self.outbox.flush();
        Ok(doc)
    }

    /// Archive a version (terminal). A dangling active assignment is
    /// cancelled in the same operation.
    pub fn archive_version(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        let (doc, released) = self.gate.archive(document_id, actor, reason)?;
        if let Some(released) = released {
            self.outbox.enqueue(ReviewEvent::AssignmentReleased {
                assignment_id: released.assignment_id,
                document_id: released.document_id,
                status: released.status,
            });
        }
        self.outbox.enqueue(ReviewEvent::DocumentArchived {
            document_id: doc.document_id.clone(),
            land_id: doc.land_id.clone(),
        });
        // Retiring the last unapproved type can complete the mapped set.
        self.enqueue_if_set_complete(&doc.land_id)?;
        self.outbox.flush();
        Ok(doc)
    }

    pub fn latest_version(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<DocumentVersion, ReviewError> {
        self.versions.get_latest(land, doc_type)
    }

    pub fn version_history(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Vec<DocumentVersion>, ReviewError> {
        self.versions.list_versions(land, doc_type)
    }

    /// Current state of one version plus its active reviewer, if any.
    pub fn document_status(
        &self,
        document_id: &DocumentId,
    ) -> Result<DocumentStatusView, ReviewError> {
        let doc = self.versions.fetch(document_id)?;
        let assigned_to = self
            .ledger
            .active_for(document_id)?
            .map(|assignment| assignment.assigned_to);
        Ok(doc.status_view(assigned_to))
    }

    pub fn get_audit_trail(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: Pagination,
    ) -> Result<AuditPage, ReviewError> {
        self.audit.list_for_land(land, filter, page)
    }

    pub fn resolve_roles(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<BTreeSet<ReviewerRole>, ReviewError> {
        self.resolver.resolve(land, doc_type)
    }

    /// Replace the full per-land visibility override set.
    pub fn set_project_override(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), ReviewError> {
        self.resolver.set_project_override(land, mapping)
    }

    /// Publication eligibility: the land service's publishable signal
    /// combined with the approval state of every visibility-mapped,
    /// non-archived document type.
    pub fn publication_status(&self, land: &LandId) -> Result<PublicationStatus, ReviewError> {
        let (has_mapped, pending) = self.mapped_approval_state(land)?;
        Ok(PublicationStatus {
            land_id: land.clone(),
            land_publishable: self.land_status.is_publishable(land),
            documents_approved: has_mapped && pending.is_empty(),
            pending_types: pending,
        })
    }

    /// Lock a document administratively, without a reviewer assignment.
    pub fn lock_document(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        self.gate.lock(document_id, actor, reason)
    }

    /// Release an administrative lock.
    pub fn unlock_document(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        reason: Option<String>,
    ) -> Result<DocumentVersion, ReviewError> {
        self.gate.unlock(document_id, actor, reason)
    }

    /// Undelivered outbox events, visible for operational monitoring.
    pub fn pending_notifications(&self) -> usize {
        self.outbox.pending_len()
    }

    /// Re-attempt delivery of queued notifications.
    pub fn redeliver_notifications(&self) -> usize {
        self.outbox.flush()
    }

    fn enqueue_if_set_complete(&self, land: &LandId) -> Result<(), ReviewError> {
        let (has_mapped, pending) = self.mapped_approval_state(land)?;
        if has_mapped && pending.is_empty() {
            self.outbox.enqueue(ReviewEvent::AllDocumentsApproved {
                land_id: land.clone(),
            });
        }
        Ok(())
    }

    fn check_rejection_cooldown(&self, doc: &DocumentVersion) -> Result<(), ReviewError> {
        let Some(days) = self.policy.rejection_cooldown_days else {
            return Ok(());
        };
        if doc.approval_status != ApprovalStatus::Rejected {
            return Ok(());
        }
        let last_rejection = self.audit.last_for_document(
            &doc.land_id,
            &doc.document_id,
            AuditAction::Rejected,
        )?;
        if let Some(entry) = last_rejection {
            let until = entry.created_at + Duration::days(i64::from(days));
            if Utc::now() < until {
                return Err(ReviewError::CooldownActive {
                    document_id: doc.document_id.clone(),
                    until,
                });
            }
        }
        Ok(())
    }

    /// For each document type on the land that still has a non-archived
    /// version and a non-empty role mapping: is its newest live version
    /// approved? Returns whether any such type exists plus the laggards.
    fn mapped_approval_state(
        &self,
        land: &LandId,
    ) -> Result<(bool, Vec<String>), ReviewError> {
        let versions = self.versions.list_for_land(land)?;
        let mut by_type: BTreeMap<&str, Vec<&DocumentVersion>> = BTreeMap::new();
        for version in &versions {
            by_type
                .entry(version.document_type.as_str())
                .or_default()
                .push(version);
        }

        let mut has_mapped = false;
        let mut pending = Vec::new();
        for (doc_type, group) in by_type {
            let newest_live = group
                .iter()
                .filter(|version| version.review_status != ReviewStatus::Archived)
                .max_by_key(|version| version.version_number);
            let Some(newest) = newest_live else {
                continue;
            };
            // Unmapped types are admin-only and do not gate publication.
            if self.resolver.resolve(land, doc_type)?.is_empty() {
                continue;
            }
            has_mapped = true;
            if newest.approval_status != ApprovalStatus::Approved {
                pending.push(doc_type.to_string());
            }
        }
        Ok((has_mapped, pending))
    }
}
