//! Redis-backed `ActivityPub` delivery implementation.
//!
//! Renders protocol activities and queues them for the apalis deliver
//! worker. Accepts and rejects go to their own queue so a backlog of
//! follows cannot hold up replies peers are waiting on.

use apalis::prelude::Storage;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use relgraph_common::{AppError, AppResult};
use relgraph_core::{ActivityDelivery, ProtocolActivity};
use relgraph_federation::ApRenderer;
use tracing::{debug, info};

use crate::jobs::DeliverJob;

/// Redis-backed `ActivityPub` delivery service.
#[derive(Clone)]
pub struct RedisDeliveryService {
    high_priority: RedisStorage<DeliverJob>,
    normal: RedisStorage<DeliverJob>,
    renderer: ApRenderer,
}

impl RedisDeliveryService {
    /// Create a new Redis delivery service.
    #[must_use]
    pub fn new(high_priority: RedisStorage<DeliverJob>, normal: RedisStorage<DeliverJob>) -> Self {
        Self {
            high_priority,
            normal,
            renderer: ApRenderer::new(),
        }
    }
}

#[async_trait]
impl ActivityDelivery for RedisDeliveryService {
    async fn deliver(
        &self,
        source_actor_id: &str,
        activity: ProtocolActivity,
        inbox: &str,
        high_priority: bool,
    ) -> AppResult<()> {
        info!(
            user_id = %source_actor_id,
            kind = activity.kind(),
            inbox = %inbox,
            high_priority,
            "Queueing activity delivery"
        );

        let document = self.renderer.render(&activity)?;
        let job = DeliverJob::new(
            source_actor_id.to_string(),
            inbox.to_string(),
            document,
            high_priority,
        );

        let mut storage = if high_priority {
            self.high_priority.clone()
        } else {
            self.normal.clone()
        };
        storage
            .push(job)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue job: {e}")))?;

        debug!(inbox = %inbox, "Queued delivery job");
        Ok(())
    }
}
