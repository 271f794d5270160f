use serde::{Deserialize, Serialize};

/// Policy knobs governing review transitions and notification dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    /// Minimum length of a cancellation reason, mirroring the withdrawal
    /// reason rule used elsewhere on the platform.
    pub min_reason_len: usize,
    /// Optional cooldown before a document rejected by a reviewer may be
    /// re-assigned. Disabled when `None`.
    pub rejection_cooldown_days: Option<u16>,
    /// Delivery attempts before an outbox event is dropped.
    pub outbox_max_attempts: u32,
    /// Upper bound on a single audit trail page.
    pub audit_page_limit: usize,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            min_reason_len: 10,
            rejection_cooldown_days: None,
            outbox_max_attempts: 3,
            audit_page_limit: 50,
        }
    }
}
