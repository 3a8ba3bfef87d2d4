//! `ActivityPub` delivery seam.
//!
//! The core hands finished protocol activities to an [`ActivityDelivery`];
//! the queue crate provides the Redis-backed implementation.

use async_trait::async_trait;
use relgraph_common::AppResult;
use std::sync::Arc;

use super::activity::ProtocolActivity;

/// Outbound delivery of follow-protocol activities.
#[async_trait]
pub trait ActivityDelivery: Send + Sync {
    /// Queue `activity`, signed as `source_actor_id`, for delivery to `inbox`.
    ///
    /// Delivery is at-least-once; retries belong to the implementation.
    async fn deliver(
        &self,
        source_actor_id: &str,
        activity: ProtocolActivity,
        inbox: &str,
        high_priority: bool,
    ) -> AppResult<()>;
}

/// Type alias for a shared delivery service.
pub type DeliveryService = Arc<dyn ActivityDelivery>;

/// Delivery that drops everything. Used when federation is disabled.
pub struct NoOpDelivery;

#[async_trait]
impl ActivityDelivery for NoOpDelivery {
    async fn deliver(
        &self,
        source_actor_id: &str,
        activity: ProtocolActivity,
        inbox: &str,
        _high_priority: bool,
    ) -> AppResult<()> {
        tracing::debug!(
            source_actor_id = %source_actor_id,
            kind = activity.kind(),
            inbox = %inbox,
            "Dropping activity, federation delivery disabled"
        );
        Ok(())
    }
}
