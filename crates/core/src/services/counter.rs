//! Follow counters.
//!
//! Keeps `following_count`/`followers_count` in step with edge mutations.
//! While neither endpoint has migrated the counters move by one; once either
//! has, the surviving endpoints are recounted from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use relgraph_common::AppResult;
use relgraph_db::repositories::InstanceRepository;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::actor::Actor;
use super::outbox::{OutboundTask, Outbox};
use super::store::RelationshipStoreService;

/// Per-host statistic touched by a follow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStat {
    /// Edges from the host's users to local users.
    FollowingCount,
    /// Edges from local users to the host's users.
    FollowersCount,
}

/// Aggregations fed by follow edges.
#[async_trait]
pub trait CounterSink: Send + Sync {
    async fn update_following_chart(
        &self,
        _follower_id: &str,
        _followee_id: &str,
        _delta: i32,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn update_instance_stats(&self, host: &str, stat: InstanceStat, delta: i32)
    -> AppResult<()>;
}

/// Type alias for a shared counter sink.
pub type CounterSinkService = Arc<dyn CounterSink>;

/// Counter sink that discards everything.
pub struct NoOpCounterSink;

#[async_trait]
impl CounterSink for NoOpCounterSink {
    async fn update_instance_stats(
        &self,
        _host: &str,
        _stat: InstanceStat,
        _delta: i32,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Counter sink writing per-host statistics to the `instance` table.
#[derive(Clone)]
pub struct InstanceStatsSink {
    instance_repo: InstanceRepository,
}

impl InstanceStatsSink {
    #[must_use]
    pub const fn new(instance_repo: InstanceRepository) -> Self {
        Self { instance_repo }
    }
}

#[async_trait]
impl CounterSink for InstanceStatsSink {
    async fn update_instance_stats(
        &self,
        host: &str,
        stat: InstanceStat,
        delta: i32,
    ) -> AppResult<()> {
        match stat {
            InstanceStat::FollowingCount => {
                self.instance_repo.adjust_following_count(host, delta).await
            }
            InstanceStat::FollowersCount => {
                self.instance_repo.adjust_followers_count(host, delta).await
            }
        }
    }
}

/// Applies counter changes for edge inserts and removals.
#[derive(Clone)]
pub struct CounterReconciler {
    store: RelationshipStoreService,
    outbox: Outbox,
    instance_stats: bool,
}

impl CounterReconciler {
    #[must_use]
    pub fn new(store: RelationshipStoreService, outbox: Outbox, instance_stats: bool) -> Self {
        Self {
            store,
            outbox,
            instance_stats,
        }
    }

    /// Account for a new edge.
    pub async fn on_follow(&self, follower: &Actor, followee: &Actor) {
        self.apply(follower, followee, 1).await;
    }

    /// Account for a removed edge.
    pub async fn on_unfollow(&self, follower: &Actor, followee: &Actor) {
        self.apply(follower, followee, -1).await;
    }

    async fn apply(&self, follower: &Actor, followee: &Actor, delta: i32) {
        if follower.has_moved() || followee.has_moved() {
            self.recount(follower, followee).await;
        } else {
            if let Err(e) = self.store.adjust_counts(&follower.id, &followee.id, delta).await {
                warn!(
                    error = %e,
                    follower_id = %follower.id,
                    followee_id = %followee.id,
                    "Failed to adjust follow counters"
                );
            }
            self.queue_instance_stats(follower, followee, delta).await;
        }

        self.outbox
            .enqueue(OutboundTask::FollowingChart {
                follower_id: follower.id.clone(),
                followee_id: followee.id.clone(),
                delta,
            })
            .await;
    }

    async fn recount(&self, follower: &Actor, followee: &Actor) {
        if !follower.has_moved() {
            let result = match self.store.count_active_following(&follower.id).await {
                Ok(count) => {
                    self.store
                        .set_following_count(&follower.id, clamp_count(count))
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, user_id = %follower.id, "Failed to recount following");
            }
        }

        if !followee.has_moved() {
            let result = match self.store.count_active_followers(&followee.id).await {
                Ok(count) => {
                    self.store
                        .set_followers_count(&followee.id, clamp_count(count))
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, user_id = %followee.id, "Failed to recount followers");
            }
        }
    }

    async fn queue_instance_stats(&self, follower: &Actor, followee: &Actor, delta: i32) {
        if !self.instance_stats {
            return;
        }

        let (host, stat) = match (follower.host(), followee.host()) {
            (Some(host), None) => (host, InstanceStat::FollowingCount),
            (None, Some(host)) => (host, InstanceStat::FollowersCount),
            _ => return,
        };

        self.outbox
            .enqueue(OutboundTask::InstanceStats {
                host: host.to_string(),
                stat,
                delta,
            })
            .await;
    }
}

fn clamp_count(count: u64) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
