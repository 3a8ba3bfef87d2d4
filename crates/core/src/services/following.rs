//! Following service.
//!
//! Owns every transition of the follow graph: direct follows, follow
//! requests and their resolution, and removal of edges from either side.
//! Side effects are queued on the [`Outbox`] only after the store has
//! committed the change.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use relgraph_common::{AppError, AppResult, BlockKind, Config};
use tracing::{debug, info, warn};

use super::activity::{ActivityFactory, ProtocolActivity};
use super::actor::Actor;
use super::blocking::BlockingOracleService;
use super::cache::FollowingsCache;
use super::counter::CounterReconciler;
use super::event_publisher::{InternalEvent, NotificationKind, UserEventKind, WebhookKind};
use super::identity::IdentityResolverService;
use super::outbox::{OutboundTask, Outbox};
use super::store::{NewRequest, RelationshipStoreService};

/// Tunables for [`FollowingService`].
#[derive(Debug, Clone)]
pub struct FollowingSettings {
    /// Public URL of this server.
    pub server_url: String,
    /// Queue protocol activities for remote actors.
    pub federation_enabled: bool,
    /// Generations of moved-from identities checked for prior approval.
    pub max_alias_depth: usize,
    /// Maintain per-host follow statistics.
    pub enable_federated_instance_stats: bool,
    /// Lifetime of a cached followee-id set.
    pub cache_ttl: Duration,
    /// Followers whose followee ids may be cached at once.
    pub cache_capacity: usize,
}

impl FollowingSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_url: config.server.url.clone(),
            federation_enabled: config.federation.enabled,
            max_alias_depth: config.following.max_alias_depth,
            enable_federated_instance_stats: config.following.enable_federated_instance_stats,
            cache_ttl: Duration::from_secs(config.following.cache_ttl_secs),
            cache_capacity: config.following.cache_capacity,
        }
    }
}

/// Collaborators of [`FollowingService`].
pub struct FollowingDeps {
    pub store: RelationshipStoreService,
    pub blocking: BlockingOracleService,
    pub identity: IdentityResolverService,
    pub outbox: Outbox,
    pub settings: FollowingSettings,
}

/// Result of a follow attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// A new edge was created.
    Followed,
    /// The edge already existed; nothing changed.
    AlreadyFollowing,
    /// A follow request is pending approval.
    Requested,
    /// A remote follow was turned away because the followee blocks the follower.
    Rejected,
    /// Self-follow or follow of an owned actor; nothing happened.
    Ignored,
}

/// Summary of [`FollowingService::accept_all_follow_requests`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptAllReport {
    pub accepted: usize,
    pub failed: usize,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    store: RelationshipStoreService,
    blocking: BlockingOracleService,
    identity: IdentityResolverService,
    outbox: Outbox,
    counters: CounterReconciler,
    cache: Arc<FollowingsCache>,
    activities: ActivityFactory,
    settings: FollowingSettings,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub fn new(deps: FollowingDeps) -> Self {
        let FollowingDeps {
            store,
            blocking,
            identity,
            outbox,
            settings,
        } = deps;

        Self {
            counters: CounterReconciler::new(
                store.clone(),
                outbox.clone(),
                settings.enable_federated_instance_stats,
            ),
            cache: Arc::new(FollowingsCache::new(
                settings.cache_ttl,
                settings.cache_capacity,
            )),
            activities: ActivityFactory::new(settings.server_url.clone()),
            store,
            blocking,
            identity,
            outbox,
            settings,
        }
    }

    /// Follow `followee_id` as `follower_id`.
    ///
    /// `request_id` is the id of an inbound remote Follow, echoed back in the
    /// Accept or Reject. `silent` suppresses the follower's own stream event.
    pub async fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
        request_id: Option<&str>,
        silent: bool,
    ) -> AppResult<FollowOutcome> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;

        if follower.is_self_or_owner_of(&followee) {
            debug!(follower_id = %follower_id, followee_id = %followee_id, "Ignoring self follow");
            return Ok(FollowOutcome::Ignored);
        }

        let (blocking, blocked) = tokio::try_join!(
            self.blocking.is_blocked(&follower.id, &followee.id),
            self.blocking.is_blocked(&followee.id, &follower.id)
        )?;

        let inbound = follower.is_remote() && followee.is_local();
        if inbound && blocked {
            info!(
                follower_id = %follower.id,
                followee_id = %followee.id,
                "Rejecting follow from blocked remote actor"
            );
            self.deliver(
                &followee,
                &follower,
                self.activities.reject(&follower, &followee, request_id),
                true,
            )
            .await;
            return Ok(FollowOutcome::Rejected);
        } else if inbound && blocking {
            info!(
                follower_id = %follower.id,
                followee_id = %followee.id,
                "Remote actor followed a user it was blocking, removing block"
            );
            self.blocking.unblock(&follower.id, &followee.id).await?;
        } else if blocking {
            return Err(AppError::BlockingViolation(BlockKind::Blocking));
        } else if blocked {
            return Err(AppError::BlockingViolation(BlockKind::Blocked));
        }

        let needs_approval = followee.is_locked
            || (followee.careful_bot && follower.is_bot)
            || (follower.is_local() && followee.is_remote());

        if needs_approval && !self.auto_accepts(&follower, &followee).await? {
            return self.request_follow(&follower, &followee, request_id).await;
        }

        let outcome = self.insert_following_doc(&followee, &follower, silent).await?;

        if inbound {
            self.deliver(
                &followee,
                &follower,
                self.activities.accept(&follower, &followee, request_id),
                true,
            )
            .await;
        }

        Ok(outcome)
    }

    /// Whether a follow needing approval can skip the request.
    async fn auto_accepts(&self, follower: &Actor, followee: &Actor) -> AppResult<bool> {
        if self.store.is_following(&follower.id, &followee.id).await? {
            return Ok(true);
        }

        if followee.is_local()
            && followee.auto_accept_followed
            && self.store.is_following(&followee.id, &follower.id).await?
        {
            return Ok(true);
        }

        if followee.is_locked {
            let ancestors = self
                .identity
                .resolve_moved_ancestors(follower, self.settings.max_alias_depth)
                .await?;
            for ancestor in ancestors {
                if self.store.is_following(&ancestor.id, &followee.id).await? {
                    debug!(
                        follower_id = %follower.id,
                        ancestor_id = %ancestor.id,
                        "Follow approved through moved-from identity"
                    );
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Create the edge `follower -> followee` and emit its side effects.
    ///
    /// A duplicate edge from a remote follower, or one that still consumed a
    /// pending request, yields [`FollowOutcome::AlreadyFollowing`]. Any other
    /// duplicate from a local follower is a conflict.
    pub async fn insert_following_doc(
        &self,
        followee: &Actor,
        follower: &Actor,
        silent: bool,
    ) -> AppResult<FollowOutcome> {
        if follower.is_self_or_owner_of(followee) {
            return Ok(FollowOutcome::Ignored);
        }

        let result = self.store.insert_following(follower, followee).await?;
        self.cache.invalidate(&follower.id).await;

        if result.superseded_request.is_some() && follower.is_local() {
            self.outbox
                .enqueue(OutboundTask::Notification {
                    notifiee_id: follower.id.clone(),
                    kind: NotificationKind::FollowRequestAccepted,
                    notifier_id: followee.id.clone(),
                })
                .await;
        }

        if !result.inserted {
            if follower.is_remote() || result.superseded_request.is_some() {
                info!(
                    follower_id = %follower.id,
                    followee_id = %followee.id,
                    "Duplicate follow ignored"
                );
                return Ok(FollowOutcome::AlreadyFollowing);
            }
            return Err(AppError::Conflict("Already following".to_string()));
        }

        self.outbox
            .enqueue(OutboundTask::InternalEvent(InternalEvent::Follow {
                follower_id: follower.id.clone(),
                followee_id: followee.id.clone(),
            }))
            .await;

        self.counters.on_follow(follower, followee).await;

        if follower.is_local() && !silent {
            self.user_event(&follower.id, UserEventKind::Follow, &followee.id).await;
            self.webhook(&follower.id, WebhookKind::Follow, &followee.id).await;
        }

        if followee.is_local() {
            self.user_event(&followee.id, UserEventKind::Followed, &follower.id).await;
            self.webhook(&followee.id, WebhookKind::Followed, &follower.id).await;
            self.outbox
                .enqueue(OutboundTask::Notification {
                    notifiee_id: followee.id.clone(),
                    kind: NotificationKind::Follow,
                    notifier_id: follower.id.clone(),
                })
                .await;
        }

        Ok(FollowOutcome::Followed)
    }

    /// Remove the edge `follower -> followee`. A missing edge is a no-op.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str, silent: bool) -> AppResult<()> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;

        if !self.remove_edge(&follower, &followee).await? {
            warn!(
                follower_id = %follower_id,
                followee_id = %followee_id,
                "Unfollow requested but not following"
            );
            return Ok(());
        }

        if !silent && follower.is_local() {
            self.user_event(&follower.id, UserEventKind::Unfollow, &followee.id).await;
            self.webhook(&follower.id, WebhookKind::Unfollow, &followee.id).await;
        }

        if follower.is_local() && followee.is_remote() {
            self.deliver(
                &follower,
                &followee,
                self.activities.undo(&follower, &followee, None),
                false,
            )
            .await;
        }

        if followee.is_local() && follower.is_remote() {
            self.deliver(
                &followee,
                &follower,
                self.activities.reject(&follower, &followee, None),
                false,
            )
            .await;
        }

        Ok(())
    }

    /// Record a pending follow from `follower_id` to `followee_id`.
    pub async fn create_follow_request(
        &self,
        follower_id: &str,
        followee_id: &str,
        request_id: Option<&str>,
    ) -> AppResult<FollowOutcome> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;
        self.request_follow(&follower, &followee, request_id).await
    }

    async fn request_follow(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> AppResult<FollowOutcome> {
        if follower.is_self_or_owner_of(followee) {
            return Ok(FollowOutcome::Ignored);
        }

        let (blocking, blocked) = tokio::try_join!(
            self.blocking.is_blocked(&follower.id, &followee.id),
            self.blocking.is_blocked(&followee.id, &follower.id)
        )?;
        if blocking {
            return Err(AppError::BlockingViolation(BlockKind::Blocking));
        }
        if blocked {
            return Err(AppError::BlockingViolation(BlockKind::Blocked));
        }

        if self.store.is_following(&follower.id, &followee.id).await? {
            debug!(
                follower_id = %follower.id,
                followee_id = %followee.id,
                "Follow request for an existing edge ignored"
            );
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let request = match self
            .store
            .insert_follow_request(follower, followee, request_id)
            .await?
        {
            NewRequest::Created(request) => request,
            NewRequest::AlreadyPending => {
                debug!(
                    follower_id = %follower.id,
                    followee_id = %followee.id,
                    "Follow request already pending"
                );
                return Ok(FollowOutcome::Requested);
            }
            NewRequest::AlreadyFollowing => return Ok(FollowOutcome::AlreadyFollowing),
        };

        if followee.is_local() {
            self.user_event(&followee.id, UserEventKind::ReceiveFollowRequest, &follower.id).await;
            self.user_event(&followee.id, UserEventKind::MeUpdated, &followee.id).await;
            self.outbox
                .enqueue(OutboundTask::Notification {
                    notifiee_id: followee.id.clone(),
                    kind: NotificationKind::ReceiveFollowRequest,
                    notifier_id: follower.id.clone(),
                })
                .await;
        }

        if follower.is_local() && followee.is_remote() {
            let follow_id = request_id.map_or_else(
                || self.activities.request_follow_id(&request.id),
                ToString::to_string,
            );
            self.deliver(
                follower,
                followee,
                self.activities.follow(follower, followee, Some(&follow_id)),
                false,
            )
            .await;
        }

        Ok(FollowOutcome::Requested)
    }

    /// Withdraw a pending request sent by `follower_id`.
    ///
    /// For a remote followee the Undo goes out even if no local request is
    /// found, so the peer can drop a request this server has forgotten.
    pub async fn cancel_follow_request(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;

        if followee.is_remote() && follower.is_local() {
            let request = self
                .store
                .find_follow_request(&follower.id, &followee.id)
                .await?;
            let follow_id = request.map(|r| {
                r.request_id
                    .unwrap_or_else(|| self.activities.request_follow_id(&r.id))
            });
            self.deliver(
                &follower,
                &followee,
                self.activities.undo(&follower, &followee, follow_id.as_deref()),
                false,
            )
            .await;
        }

        if !self
            .store
            .delete_follow_request(&follower.id, &followee.id)
            .await?
        {
            return Err(AppError::FollowRequestNotFound);
        }

        if followee.is_local() {
            self.user_event(&followee.id, UserEventKind::MeUpdated, &followee.id).await;
        }

        Ok(())
    }

    /// Approve the pending request from `follower_id`.
    pub async fn accept_follow_request(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;
        self.accept_request(&followee, &follower).await
    }

    async fn accept_request(&self, followee: &Actor, follower: &Actor) -> AppResult<()> {
        let request = self
            .store
            .find_follow_request(&follower.id, &followee.id)
            .await?
            .ok_or(AppError::FollowRequestNotFound)?;

        self.insert_following_doc(followee, follower, false).await?;

        if follower.is_remote() && followee.is_local() {
            self.deliver(
                followee,
                follower,
                self.activities
                    .accept(follower, followee, request.request_id.as_deref()),
                true,
            )
            .await;
        }

        if followee.is_local() {
            self.user_event(&followee.id, UserEventKind::MeUpdated, &followee.id).await;
        }

        Ok(())
    }

    /// Approve every pending request addressed to `followee_id`.
    ///
    /// Requests are processed one at a time; a failure is logged and counted
    /// without stopping the rest.
    pub async fn accept_all_follow_requests(&self, followee_id: &str) -> AppResult<AcceptAllReport> {
        let followee = self.identity.resolve(followee_id).await?;
        let requests = self.store.pending_requests_for(followee_id).await?;
        let mut report = AcceptAllReport::default();

        for request in requests {
            let result = match self.identity.resolve(&request.follower_id).await {
                Ok(follower) => self.accept_request(&followee, &follower).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => report.accepted += 1,
                Err(e) => {
                    warn!(
                        error = %e,
                        follower_id = %request.follower_id,
                        followee_id = %followee_id,
                        "Failed to accept follow request"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Decline the pending request from `follower_id`.
    pub async fn reject_follow_request(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;

        let follow_id = self.stored_follow_id(&follower, &followee).await?;
        let removed = self
            .store
            .delete_follow_request(&follower.id, &followee.id)
            .await?;

        self.finish_rejection(&follower, &followee, follow_id.as_deref(), removed).await;
        Ok(())
    }

    /// Remove an established follower.
    pub async fn reject_follow(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let (follower, followee) = tokio::try_join!(
            self.identity.resolve(follower_id),
            self.identity.resolve(followee_id)
        )?;

        let follow_id = self.stored_follow_id(&follower, &followee).await?;
        let removed = self.remove_edge(&follower, &followee).await?;

        self.finish_rejection(&follower, &followee, follow_id.as_deref(), removed).await;
        Ok(())
    }

    /// Followee ids of `follower_id`, served from the cache.
    pub async fn followee_ids(&self, follower_id: &str) -> AppResult<Arc<HashSet<String>>> {
        self.cache.get_or_load(follower_id, self.store.as_ref()).await
    }

    /// Apply a follow graph event published by another process.
    pub async fn handle_internal_event(&self, event: &InternalEvent) {
        let (InternalEvent::Follow { follower_id, .. } | InternalEvent::Unfollow { follower_id, .. }) =
            event;
        self.cache.invalidate(follower_id).await;
    }

    /// Correlation token of a remote follower's stored request, if any.
    async fn stored_follow_id(&self, follower: &Actor, followee: &Actor) -> AppResult<Option<String>> {
        if follower.is_local() {
            return Ok(None);
        }
        Ok(self
            .store
            .find_follow_request(&follower.id, &followee.id)
            .await?
            .and_then(|r| r.request_id))
    }

    async fn finish_rejection(
        &self,
        follower: &Actor,
        followee: &Actor,
        follow_id: Option<&str>,
        removed: bool,
    ) {
        if follower.is_remote() && followee.is_local() {
            self.deliver(
                followee,
                follower,
                self.activities.reject(follower, followee, follow_id),
                true,
            )
            .await;
        }

        if removed && follower.is_local() {
            self.user_event(&follower.id, UserEventKind::Unfollow, &followee.id).await;
            self.webhook(&follower.id, WebhookKind::Unfollow, &followee.id).await;
        }
    }

    /// Delete an edge and run the bookkeeping. Returns whether one existed.
    async fn remove_edge(&self, follower: &Actor, followee: &Actor) -> AppResult<bool> {
        if self
            .store
            .delete_following(&follower.id, &followee.id)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        self.cache.invalidate(&follower.id).await;
        self.outbox
            .enqueue(OutboundTask::InternalEvent(InternalEvent::Unfollow {
                follower_id: follower.id.clone(),
                followee_id: followee.id.clone(),
            }))
            .await;
        self.counters.on_unfollow(follower, followee).await;
        Ok(true)
    }

    /// Queue `activity` from `source` to the inbox of `target`.
    async fn deliver(&self, source: &Actor, target: &Actor, activity: ProtocolActivity, high_priority: bool) {
        if !self.settings.federation_enabled {
            debug!(kind = activity.kind(), target_id = %target.id, "Federation disabled, not delivering");
            return;
        }
        let Some(inbox) = target.inbox() else {
            return;
        };

        self.outbox
            .enqueue(OutboundTask::Deliver {
                source_actor_id: source.id.clone(),
                activity,
                inbox: inbox.to_string(),
                high_priority,
            })
            .await;
    }

    async fn user_event(&self, user_id: &str, kind: UserEventKind, subject_id: &str) {
        self.outbox
            .enqueue(OutboundTask::UserEvent {
                user_id: user_id.to_string(),
                kind,
                subject_id: subject_id.to_string(),
            })
            .await;
    }

    async fn webhook(&self, user_id: &str, kind: WebhookKind, subject_id: &str) {
        self.outbox
            .enqueue(OutboundTask::Webhook {
                user_id: user_id.to_string(),
                kind,
                subject_id: subject_id.to_string(),
            })
            .await;
    }
}
