use chrono::{DateTime, Utc};

use super::domain::{AssignmentId, AssignmentStatus, DocumentId, ReviewStatus, ReviewerRole, UserId};
use super::gateways::BlobError;
use super::repository::StoreError;

/// Error raised by the document review engine.
///
/// Variants carry the current state where a caller needs it to resync
/// without polling.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("document version {0} not found")]
    NotFound(DocumentId),
    #[error("assignment {0} not found")]
    AssignmentNotFound(AssignmentId),
    #[error("document {document_id} already assigned (review status {current})")]
    AlreadyAssigned {
        document_id: DocumentId,
        current: ReviewStatus,
    },
    #[error("role {role} may not review {document_type} documents for this land")]
    RoleMismatch {
        role: ReviewerRole,
        document_type: String,
    },
    #[error("reviewer {0} is not an active user")]
    UnknownReviewer(UserId),
    #[error("invalid assignment transition {from} -> {to}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },
    #[error("document {0} is already under review")]
    AlreadyLocked(DocumentId),
    #[error("document {document_id} is not under review (current status {current})")]
    NotUnderReview {
        document_id: DocumentId,
        current: ReviewStatus,
    },
    #[error("document {0} is archived and immutable")]
    DocumentArchived(DocumentId),
    #[error("actor {0} is neither the assigned reviewer nor an administrator")]
    NotAssignedReviewer(UserId),
    #[error("a reason of at least {min} characters is required")]
    ReasonTooShort { min: usize },
    #[error("document {document_id} was rejected recently; reassignment allowed after {until}")]
    CooldownActive {
        document_id: DocumentId,
        until: DateTime<Utc>,
    },
    #[error("conflicting concurrent update for document {0}; retry the operation")]
    Conflict(DocumentId),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
