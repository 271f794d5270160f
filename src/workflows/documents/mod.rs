//! Document version lineage and review-assignment workflow.
//!
//! Every upload becomes an immutable version in a per-`(land, document
//! type)` lineage with a single latest pointer. A document is locked to at
//! most one active reviewer at a time; the lock is a derived effect of the
//! assignment, and approve/reject decisions release it. Role visibility is
//! resolved through per-project overrides falling back to global defaults,
//! and every transition lands in an append-only audit trail.

pub mod assignments;
pub mod audit;
pub mod domain;
pub mod error;
pub mod gate;
pub mod gateways;
pub mod memory;
pub mod outbox;
pub mod policy;
pub mod repository;
pub mod service;
pub mod versions;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use assignments::AssignmentLedger;
pub use audit::AuditRecorder;
pub use domain::{
    ApprovalStatus, Assignment, AssignmentId, AssignmentPriority, AssignmentRequest,
    AssignmentStatus, AssignmentView, AuditAction, AuditEntry, AuditId, ContentRef, DocumentId,
    DocumentStatusView, DocumentVersion, LandId, PublicationStatus, ReviewStatus, ReviewerRole,
    UploadRequest, UserId,
};
pub use error::ReviewError;
pub use gate::ReviewGate;
pub use gateways::{BlobError, BlobStore, IdentityProvider, LandStatusGateway};
pub use memory::MemoryStore;
pub use outbox::{EventPublisher, Outbox, PublishError, ReviewEvent};
pub use policy::ReviewPolicy;
pub use repository::{
    AssignmentRepository, AuditFilter, AuditPage, AuditRepository, NewVersionRecord, Pagination,
    ReviewStateUpdate, ReviewStore, StoreError, VersionRepository, VisibilityRepository,
};
pub use service::DocumentReviewService;
pub use versions::VersionStore;
pub use visibility::RoleVisibilityResolver;
