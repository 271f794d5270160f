//! Document version and review-assignment engine for the renewable energy
//! land marketplace.
//!
//! Every uploaded file becomes an immutable version in a per-`(land,
//! document type)` lineage, a document can be locked to at most one active
//! reviewer at a time, visibility of a document type is gated by reviewer
//! role, and approval decisions feed the land publication predicate. The
//! HTTP surface, blob byte storage, and land lifecycle live elsewhere and
//! are consumed through the gateway traits in
//! [`workflows::documents::gateways`].

pub mod config;
pub mod telemetry;
pub mod workflows;
