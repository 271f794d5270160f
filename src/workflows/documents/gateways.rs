//! Trait seams for the collaborators the engine consumes but does not own:
//! user identity, blob byte storage, and the land status service.

use std::collections::BTreeSet;

use super::domain::{ContentRef, LandId, ReviewerRole, UserId};

/// Identity and role lookups delegated to the platform user service.
pub trait IdentityProvider: Send + Sync {
    fn is_active_user(&self, user: &UserId) -> bool;
    fn roles_of(&self, user: &UserId) -> BTreeSet<ReviewerRole>;
}

/// Byte storage for uploaded files; the engine persists only the returned
/// reference.
pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<ContentRef, BlobError>;
    fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, BlobError>;
}

/// Blob collaborator failure.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("no blob stored under {0}")]
    Missing(String),
}

/// Read-side signal from the land status service.
pub trait LandStatusGateway: Send + Sync {
    fn is_publishable(&self, land: &LandId) -> bool;
}
