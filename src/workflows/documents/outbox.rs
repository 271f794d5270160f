//! At-least-once dispatch of post-commit notifications.
//!
//! Transitions enqueue events after their state mutation commits; delivery
//! failures are logged and retried on later flushes, and never fail the
//! originating transition.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::domain::{
    ApprovalStatus, AssignmentId, AssignmentStatus, DocumentId, LandId, ReviewerRole, UserId,
};

/// Notification emitted to the rest of the platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReviewEvent {
    ReviewerAssigned {
        document_id: DocumentId,
        land_id: LandId,
        reviewer: UserId,
        role: ReviewerRole,
    },
    AssignmentReleased {
        assignment_id: AssignmentId,
        document_id: DocumentId,
        status: AssignmentStatus,
    },
    DecisionRecorded {
        document_id: DocumentId,
        land_id: LandId,
        decision: ApprovalStatus,
        actor: UserId,
    },
    DocumentArchived {
        document_id: DocumentId,
        land_id: LandId,
    },
    AllDocumentsApproved {
        land_id: LandId,
    },
}

/// Trait describing the outbound notification transport (messaging, land
/// status service callbacks).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &ReviewEvent) -> Result<(), PublishError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

struct PendingEvent {
    event: ReviewEvent,
    attempts: u32,
}

/// Post-commit event queue with bounded redelivery.
pub struct Outbox<P> {
    publisher: Arc<P>,
    pending: Mutex<VecDeque<PendingEvent>>,
    max_attempts: u32,
}

impl<P> Outbox<P>
where
    P: EventPublisher,
{
    pub fn new(publisher: Arc<P>, max_attempts: u32) -> Self {
        Self {
            publisher,
            pending: Mutex::new(VecDeque::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn enqueue(&self, event: ReviewEvent) {
        self.pending
            .lock()
            .expect("outbox mutex poisoned")
            .push_back(PendingEvent { event, attempts: 0 });
    }

    /// Attempt delivery of everything pending. Returns the number of
    /// events delivered; failed events stay queued until `max_attempts`.
    pub fn flush(&self) -> usize {
        let batch: Vec<PendingEvent> = {
            let mut pending = self.pending.lock().expect("outbox mutex poisoned");
            pending.drain(..).collect()
        };

        let mut delivered = 0;
        let mut requeue = Vec::new();
        for mut item in batch {
            match self.publisher.publish(&item.event) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    item.attempts += 1;
                    if item.attempts >= self.max_attempts {
                        tracing::error!(
                            event = ?item.event,
                            attempts = item.attempts,
                            %err,
                            "dropping undeliverable review event"
                        );
                    } else {
                        tracing::warn!(
                            event = ?item.event,
                            attempts = item.attempts,
                            %err,
                            "review event delivery failed, will retry"
                        );
                        requeue.push(item);
                    }
                }
            }
        }

        if !requeue.is_empty() {
            let mut pending = self.pending.lock().expect("outbox mutex poisoned");
            for item in requeue {
                pending.push_back(item);
            }
        }
        delivered
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("outbox mutex poisoned").len()
    }
}
