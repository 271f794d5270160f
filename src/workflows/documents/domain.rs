use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for land parcels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LandId(pub String);

impl fmt::Display for LandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for one physical upload (a document version).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for reviewer assignments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for audit entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditId(pub String);

/// Identity of a platform user (landowner, reviewer, or administrator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to file bytes held by the external blob collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef(pub String);

const ADMIN_ROLE: &str = "administrator";

/// Reviewer role key, e.g. `re_sales_advisor` or `legal_advisor`.
///
/// Roles are free-form keys managed by the identity collaborator; the one
/// distinguished value is the administrator capability, which bypasses
/// visibility mappings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewerRole(pub String);

impl ReviewerRole {
    pub fn admin() -> Self {
        Self(ADMIN_ROLE.to_string())
    }

    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROLE
    }
}

impl fmt::Display for ReviewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reviewer decision recorded on a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review-lock state of a document version. `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Active,
    UnderReview,
    Archived,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::UnderReview => "under_review",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a reviewer assignment. `Assigned` and `InProgress` hold the
/// document lock; `Completed` and `Cancelled` release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reviewer-facing priority of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl AssignmentPriority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for AssignmentPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Transition kinds recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Assigned,
    Locked,
    Unlocked,
    Approved,
    Rejected,
    Archived,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable upload within a `(land, document type)` lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub document_id: DocumentId,
    pub land_id: LandId,
    pub document_type: String,
    pub version_number: u32,
    pub parent_document_id: Option<DocumentId>,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub content_ref: ContentRef,
    pub approval_status: ApprovalStatus,
    pub review_status: ReviewStatus,
    pub is_latest: bool,
}

/// Upload submitted by a landowner; the byte payload goes to the blob
/// collaborator, only the returned reference is persisted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub land_id: LandId,
    pub document_type: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub uploaded_by: UserId,
}

/// Ledger row binding one reviewer to one document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: AssignmentId,
    pub document_id: DocumentId,
    pub land_id: LandId,
    pub assigned_to: UserId,
    pub assigned_by: UserId,
    pub reviewer_role: ReviewerRole,
    pub status: AssignmentStatus,
    pub priority: AssignmentPriority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Optional attributes supplied when an administrator creates an assignment.
#[derive(Debug, Clone, Default)]
pub struct AssignmentRequest {
    pub priority: AssignmentPriority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Append-only record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: AuditId,
    pub document_id: DocumentId,
    pub land_id: LandId,
    pub action: AuditAction,
    pub old_status: ReviewStatus,
    pub new_status: ReviewStatus,
    pub changed_by: UserId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sanitized representation of a document's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatusView {
    pub document_id: DocumentId,
    pub land_id: LandId,
    pub document_type: String,
    pub version_number: u32,
    pub approval_status: &'static str,
    pub review_status: &'static str,
    pub is_latest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

impl DocumentVersion {
    pub fn status_view(&self, assigned_to: Option<UserId>) -> DocumentStatusView {
        DocumentStatusView {
            document_id: self.document_id.clone(),
            land_id: self.land_id.clone(),
            document_type: self.document_type.clone(),
            version_number: self.version_number,
            approval_status: self.approval_status.label(),
            review_status: self.review_status.label(),
            is_latest: self.is_latest,
            assigned_to,
        }
    }
}

/// Sanitized representation of an assignment for API layers.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub assignment_id: AssignmentId,
    pub document_id: DocumentId,
    pub assigned_to: UserId,
    pub reviewer_role: ReviewerRole,
    pub status: &'static str,
    pub priority: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl Assignment {
    pub fn view(&self) -> AssignmentView {
        AssignmentView {
            assignment_id: self.assignment_id.clone(),
            document_id: self.document_id.clone(),
            assigned_to: self.assigned_to.clone(),
            reviewer_role: self.reviewer_role.clone(),
            status: self.status.label(),
            priority: self.priority.label(),
            due_date: self.due_date,
        }
    }
}

/// Publication eligibility snapshot for one land parcel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicationStatus {
    pub land_id: LandId,
    pub land_publishable: bool,
    pub documents_approved: bool,
    pub pending_types: Vec<String>,
}

impl PublicationStatus {
    /// A land may go live once the land service clears it and every
    /// visibility-mapped document type carries an approved latest version.
    pub fn is_eligible(&self) -> bool {
        self.land_publishable && self.documents_approved
    }
}
