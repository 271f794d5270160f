use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::workflows::documents::domain::{
    Assignment, AssignmentId, AssignmentRequest, AssignmentStatus, AuditEntry, ContentRef,
    DocumentId, DocumentVersion, LandId, ReviewStatus, ReviewerRole, UploadRequest, UserId,
};
use crate::workflows::documents::gateways::{
    BlobError, BlobStore, IdentityProvider, LandStatusGateway,
};
use crate::workflows::documents::memory::MemoryStore;
use crate::workflows::documents::outbox::{EventPublisher, PublishError, ReviewEvent};
use crate::workflows::documents::policy::ReviewPolicy;
use crate::workflows::documents::repository::{
    AssignmentRepository, AuditFilter, AuditPage, AuditRepository, NewVersionRecord, Pagination,
    ReviewStateUpdate, ReviewStore, StoreError, VersionRepository, VisibilityRepository,
};
use crate::workflows::documents::service::DocumentReviewService;

pub(super) const VALUATION: &str = "land-valuation";
pub(super) const GRID_STUDY: &str = "grid-connection-study";
pub(super) const SALES_ROLE: &str = "re_sales_advisor";
pub(super) const TECH_ROLE: &str = "technical_advisor";

pub(super) fn land() -> LandId {
    LandId("land-0001".to_string())
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn role(name: &str) -> ReviewerRole {
    ReviewerRole(name.to_string())
}

pub(super) fn roles(names: &[&str]) -> BTreeSet<ReviewerRole> {
    names.iter().map(|name| role(name)).collect()
}

pub(super) fn default_visibility() -> BTreeMap<String, BTreeSet<ReviewerRole>> {
    let mut defaults = BTreeMap::new();
    defaults.insert(VALUATION.to_string(), roles(&[SALES_ROLE]));
    defaults.insert(GRID_STUDY.to_string(), roles(&[TECH_ROLE]));
    defaults
}

#[derive(Default)]
pub(super) struct MemoryIdentity {
    users: HashMap<UserId, BTreeSet<ReviewerRole>>,
}

impl MemoryIdentity {
    pub(super) fn with_user(mut self, id: &str, role_names: &[&str]) -> Self {
        self.users.insert(user(id), roles(role_names));
        self
    }
}

impl IdentityProvider for MemoryIdentity {
    fn is_active_user(&self, user: &UserId) -> bool {
        self.users.contains_key(user)
    }

    fn roles_of(&self, user: &UserId) -> BTreeSet<ReviewerRole> {
        self.users.get(user).cloned().unwrap_or_default()
    }
}

pub(super) fn identity() -> MemoryIdentity {
    MemoryIdentity::default()
        .with_user("admin-1", &["administrator"])
        .with_user("rev-1", &[SALES_ROLE])
        .with_user("rev-2", &[SALES_ROLE])
        .with_user("rev-3", &[TECH_ROLE])
}

#[derive(Default)]
pub(super) struct MemoryBlobs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl BlobStore for MemoryBlobs {
    fn put(&self, bytes: &[u8]) -> Result<ContentRef, BlobError> {
        let mut blobs = self.blobs.lock().expect("blob mutex poisoned");
        let key = format!("blob-{:04}", blobs.len() + 1);
        blobs.insert(key.clone(), bytes.to_vec());
        Ok(ContentRef(key))
    }

    fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .get(&content_ref.0)
            .cloned()
            .ok_or_else(|| BlobError::Missing(content_ref.0.clone()))
    }
}

pub(super) struct StaticLandStatus {
    publishable: AtomicBool,
}

impl StaticLandStatus {
    pub(super) fn new(publishable: bool) -> Self {
        Self {
            publishable: AtomicBool::new(publishable),
        }
    }

    pub(super) fn set_publishable(&self, publishable: bool) {
        self.publishable.store(publishable, Ordering::Relaxed);
    }
}

impl LandStatusGateway for StaticLandStatus {
    fn is_publishable(&self, _land: &LandId) -> bool {
        self.publishable.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub(super) struct MemoryPublisher {
    events: Mutex<Vec<ReviewEvent>>,
}

impl MemoryPublisher {
    pub(super) fn events(&self) -> Vec<ReviewEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: &ReviewEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Publisher that fails a configured number of deliveries before
/// recovering, for outbox redelivery tests.
pub(super) struct FailingPublisher {
    failures_left: AtomicU32,
    delivered: Mutex<Vec<ReviewEvent>>,
}

impl FailingPublisher {
    pub(super) fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn delivered(&self) -> Vec<ReviewEvent> {
        self.delivered.lock().expect("event mutex poisoned").clone()
    }
}

impl EventPublisher for FailingPublisher {
    fn publish(&self, event: &ReviewEvent) -> Result<(), PublishError> {
        let remaining = self.failures_left.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::Relaxed);
            return Err(PublishError::Transport("message bus offline".to_string()));
        }
        self.delivered
            .lock()
            .expect("event mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Store wrapper that reports a transient serialization failure a fixed
/// number of times before delegating, for retry tests.
pub(super) struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicU32,
}

impl FlakyStore {
    pub(super) fn failing(times: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(times),
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        let remaining = self.failures_left.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::Relaxed);
            return Err(StoreError::Serialization(
                "could not serialize access".to_string(),
            ));
        }
        Ok(())
    }
}

impl VersionRepository for FlakyStore {
    fn append(&self, record: NewVersionRecord) -> Result<DocumentVersion, StoreError> {
        self.inner.append(record)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, StoreError> {
        VersionRepository::fetch(&self.inner, id)
    }

    fn latest(&self, land: &LandId, doc_type: &str) -> Result<Option<DocumentVersion>, StoreError> {
        self.inner.latest(land, doc_type)
    }

    fn lineage(&self, land: &LandId, doc_type: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        self.inner.lineage(land, doc_type)
    }

    fn for_land(&self, land: &LandId) -> Result<Vec<DocumentVersion>, StoreError> {
        self.inner.for_land(land)
    }

    fn transition_review(
        &self,
        id: &DocumentId,
        allowed_from: &[ReviewStatus],
        update: ReviewStateUpdate,
    ) -> Result<DocumentVersion, StoreError> {
        self.inner.transition_review(id, allowed_from, update)
    }
}

impl AssignmentRepository for FlakyStore {
    fn insert_active(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        self.trip()?;
        self.inner.insert_active(assignment)
    }

    fn fetch(&self, id: &AssignmentId) -> Result<Option<Assignment>, StoreError> {
        AssignmentRepository::fetch(&self.inner, id)
    }

    fn active_for(&self, document: &DocumentId) -> Result<Option<Assignment>, StoreError> {
        self.inner.active_for(document)
    }

    fn transition(
        &self,
        id: &AssignmentId,
        allowed_from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError> {
        self.inner.transition(id, allowed_from, to, at)
    }

    fn for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, StoreError> {
        self.inner.for_reviewer(reviewer, status)
    }
}

impl VisibilityRepository for FlakyStore {
    fn project_override(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Option<BTreeSet<ReviewerRole>>, StoreError> {
        self.inner.project_override(land, doc_type)
    }

    fn replace_overrides(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), StoreError> {
        self.inner.replace_overrides(land, mapping)
    }
}

impl AuditRepository for FlakyStore {
    fn append_audit(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        self.inner.append_audit(entry)
    }

    fn audit_for_land(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: &Pagination,
    ) -> Result<AuditPage, StoreError> {
        self.inner.audit_for_land(land, filter, page)
    }
}

/// Store wrapper whose assignment transitions lose their compare-and-swap
/// a fixed number of times, as if a concurrent writer moved the row first.
pub(super) struct ContestedStore {
    inner: MemoryStore,
    losses_left: AtomicU32,
}

impl ContestedStore {
    pub(super) fn losing(times: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            losses_left: AtomicU32::new(times),
        }
    }

    fn contend(&self) -> Result<(), StoreError> {
        let remaining = self.losses_left.load(Ordering::Relaxed);
        if remaining > 0 {
            self.losses_left.store(remaining - 1, Ordering::Relaxed);
            return Err(StoreError::Conflict);
        }
        Ok(())
    }
}

impl VersionRepository for ContestedStore {
    fn append(&self, record: NewVersionRecord) -> Result<DocumentVersion, StoreError> {
        self.inner.append(record)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, StoreError> {
        VersionRepository::fetch(&self.inner, id)
    }

    fn latest(&self, land: &LandId, doc_type: &str) -> Result<Option<DocumentVersion>, StoreError> {
        self.inner.latest(land, doc_type)
    }

    fn lineage(&self, land: &LandId, doc_type: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        self.inner.lineage(land, doc_type)
    }

    fn for_land(&self, land: &LandId) -> Result<Vec<DocumentVersion>, StoreError> {
        self.inner.for_land(land)
    }

    fn transition_review(
        &self,
        id: &DocumentId,
        allowed_from: &[ReviewStatus],
        update: ReviewStateUpdate,
    ) -> Result<DocumentVersion, StoreError> {
        self.inner.transition_review(id, allowed_from, update)
    }
}

impl AssignmentRepository for ContestedStore {
    fn insert_active(&self, assignment: Assignment) -> Result<Assignment, StoreError> {
        self.inner.insert_active(assignment)
    }

    fn fetch(&self, id: &AssignmentId) -> Result<Option<Assignment>, StoreError> {
        AssignmentRepository::fetch(&self.inner, id)
    }

    fn active_for(&self, document: &DocumentId) -> Result<Option<Assignment>, StoreError> {
        self.inner.active_for(document)
    }

    fn transition(
        &self,
        id: &AssignmentId,
        allowed_from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError> {
        self.contend()?;
        self.inner.transition(id, allowed_from, to, at)
    }

    fn for_reviewer(
        &self,
        reviewer: &UserId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>, StoreError> {
        self.inner.for_reviewer(reviewer, status)
    }
}

impl VisibilityRepository for ContestedStore {
    fn project_override(
        &self,
        land: &LandId,
        doc_type: &str,
    ) -> Result<Option<BTreeSet<ReviewerRole>>, StoreError> {
        self.inner.project_override(land, doc_type)
    }

    fn replace_overrides(
        &self,
        land: &LandId,
        mapping: BTreeMap<String, BTreeSet<ReviewerRole>>,
    ) -> Result<(), StoreError> {
        self.inner.replace_overrides(land, mapping)
    }
}

impl AuditRepository for ContestedStore {
    fn append_audit(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        self.inner.append_audit(entry)
    }

    fn audit_for_land(
        &self,
        land: &LandId,
        filter: &AuditFilter,
        page: &Pagination,
    ) -> Result<AuditPage, StoreError> {
        self.inner.audit_for_land(land, filter, page)
    }
}

pub(super) struct Fixture {
    pub(super) service: DocumentReviewService<MemoryStore, MemoryPublisher>,
    pub(super) events: Arc<MemoryPublisher>,
    pub(super) land_status: Arc<StaticLandStatus>,
}

pub(super) fn fixture() -> Fixture {
    fixture_with(ReviewPolicy::default())
}

pub(super) fn fixture_with(policy: ReviewPolicy) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(MemoryPublisher::default());
    let land_status = Arc::new(StaticLandStatus::new(true));
    let service = DocumentReviewService::new(
        store,
        events.clone(),
        Arc::new(identity()),
        Arc::new(MemoryBlobs::default()),
        land_status.clone(),
        default_visibility(),
        policy,
    );
    Fixture {
        service,
        events,
        land_status,
    }
}

pub(super) fn upload<S, P>(
    service: &DocumentReviewService<S, P>,
    land_id: &LandId,
    doc_type: &str,
) -> DocumentVersion
where
    S: ReviewStore + 'static,
    P: EventPublisher + 'static,
{
    service
        .upload_document(UploadRequest {
            land_id: land_id.clone(),
            document_type: doc_type.to_string(),
            file_name: format!("{doc_type}.pdf"),
            mime_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.7 fixture".to_vec(),
            uploaded_by: user("owner-1"),
        })
        .expect("upload succeeds")
}

pub(super) fn assign<S, P>(
    service: &DocumentReviewService<S, P>,
    document_id: &DocumentId,
) -> Assignment
where
    S: ReviewStore + 'static,
    P: EventPublisher + 'static,
{
    service
        .assign_document(
            document_id,
            user("rev-1"),
            role(SALES_ROLE),
            user("admin-1"),
            AssignmentRequest::default(),
        )
        .expect("assignment succeeds")
}
