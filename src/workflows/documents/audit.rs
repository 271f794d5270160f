use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::domain::{
    AuditAction, AuditEntry, AuditId, DocumentId, LandId, ReviewStatus, UserId,
};
use super::error::ReviewError;
use super::policy::ReviewPolicy;
use super::repository::{retry_once, AuditFilter, AuditPage, AuditRepository, Pagination};

static AUDIT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_audit_id() -> AuditId {
    let id = AUDIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AuditId(format!("audit-{id:06}"))
}

/// Append-only transition log. Corrections are new entries, never edits.
pub struct AuditRecorder<S> {
    store: Arc<S>,
    policy: ReviewPolicy,
}

impl<S> AuditRecorder<S>
where
    S: AuditRepository,
{
    pub fn new(store: Arc<S>, policy: ReviewPolicy) -> Self {
        Self { store, policy }
    }

    /// Append one entry for a committed transition.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record(
        &self,
        document_id: &DocumentId,
        land_id: &LandId,
        action: AuditAction,
        old_status: ReviewStatus,
        new_status: ReviewStatus,
        changed_by: &UserId,
        reason: Option<String>,
    ) -> Result<AuditEntry, ReviewError> {
        let entry = AuditEntry {
            audit_id: next_audit_id(),
            document_id: document_id.clone(),
            land_id: land_id.clone(),
            action,
            old_status,
            new_status,
            changed_by: changed_by.clone(),
            reason,
            created_at: Utc::now(),
        };
        tracing::info!(
            document = %entry.document_id,
            land = %entry.land_id,
            action = %entry.action,
            old = %entry.old_status,
            new = %entry.new_status,
            "document review transition"
        );
        Ok(retry_once(|| self.store.append_audit(entry.clone()))?)
    }

    /// Trail for one land, newest first, restartable via offset/limit. The
    /// requested window is clamped to the configured page limit.
    pub fn list_for_land(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: Pagination,
    ) -> Result<AuditPage, ReviewError> {
        let page = Pagination {
            offset: page.offset,
            limit: page.limit.min(self.policy.audit_page_limit),
        };
        Ok(self.store.audit_for_land(land, filter, &page)?)
    }

    /// Most recent entry for one document and action, if any.
    pub(crate) fn last_for_document(
        &self,
        land: &LandId,
        document: &DocumentId,
        action: AuditAction,
    ) -> Result<Option<AuditEntry>, ReviewError> {
        let filter = AuditFilter {
            action: Some(action),
            document_id: Some(document.clone()),
            changed_by: None,
        };
        let page = self.store.audit_for_land(
            land,
            &filter,
            &Pagination {
                offset: 0,
                limit: 1,
            },
        )?;
        Ok(page.entries.into_iter().next())
    }
}
