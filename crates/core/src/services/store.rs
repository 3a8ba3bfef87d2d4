//! Relationship store.
//!
//! Durable follow requests, following edges, and the denormalized counters
//! derived from them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use relgraph_common::{AppResult, IdGenerator};
use relgraph_db::{
    entities::{follow_request, following},
    repositories::{
        EdgeInsert, FollowRequestRepository, FollowingRepository, RequestInsert, UserRepository,
    },
};
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

use super::actor::{Actor, ActorOrigin};

/// Result of [`RelationshipStore::insert_follow_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRequest {
    /// A request row was written.
    Created(follow_request::Model),
    /// A request for the pair was already pending.
    AlreadyPending,
    /// The pair already has an edge; no request was written.
    AlreadyFollowing,
}

/// Storage for follow requests and following edges.
///
/// Implementations must keep at most one of {request, edge} per ordered
/// pair, even under concurrent inserts.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn find_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>>;

    async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_following(follower_id, followee_id).await?.is_some())
    }

    /// Insert an edge and remove any pending request for the pair, atomically.
    async fn insert_following(&self, follower: &Actor, followee: &Actor) -> AppResult<EdgeInsert>;

    /// Remove an edge, returning it if one existed.
    async fn delete_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>>;

    async fn find_follow_request(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>>;

    /// Insert a pending request unless the pair already has a request or an
    /// edge.
    async fn insert_follow_request(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> AppResult<NewRequest>;

    /// Remove a pending request. Returns whether one existed.
    async fn delete_follow_request(&self, follower_id: &str, followee_id: &str) -> AppResult<bool>;

    /// Pending requests addressed to `followee_id`, oldest first.
    async fn pending_requests_for(&self, followee_id: &str) -> AppResult<Vec<follow_request::Model>>;

    async fn followee_ids(&self, follower_id: &str) -> AppResult<Vec<String>>;

    /// Add `delta` to the follower's following count and the followee's
    /// followers count. Counts never drop below zero.
    async fn adjust_counts(&self, follower_id: &str, followee_id: &str, delta: i32) -> AppResult<()>;

    /// Edges from `user_id` whose followee has not migrated.
    async fn count_active_following(&self, user_id: &str) -> AppResult<u64>;

    /// Edges into `user_id` whose follower has not migrated.
    async fn count_active_followers(&self, user_id: &str) -> AppResult<u64>;

    async fn set_following_count(&self, user_id: &str, count: i32) -> AppResult<()>;

    async fn set_followers_count(&self, user_id: &str, count: i32) -> AppResult<()>;
}

/// Type alias for a shared relationship store.
pub type RelationshipStoreService = Arc<dyn RelationshipStore>;

/// `PostgreSQL` relationship store.
#[derive(Clone)]
pub struct DbRelationshipStore {
    following_repo: FollowingRepository,
    follow_request_repo: FollowRequestRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl DbRelationshipStore {
    #[must_use]
    pub const fn new(
        following_repo: FollowingRepository,
        follow_request_repo: FollowRequestRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            following_repo,
            follow_request_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }
}

#[async_trait]
impl RelationshipStore for DbRelationshipStore {
    async fn find_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        self.following_repo.find_by_pair(follower_id, followee_id).await
    }

    async fn insert_following(&self, follower: &Actor, followee: &Actor) -> AppResult<EdgeInsert> {
        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower.id.clone()),
            followee_id: Set(followee.id.clone()),
            follower_host: Set(follower.host().map(ToString::to_string)),
            follower_inbox: Set(follower.inbox().map(ToString::to_string)),
            follower_shared_inbox: Set(shared_inbox(follower)),
            followee_host: Set(followee.host().map(ToString::to_string)),
            followee_inbox: Set(followee.inbox().map(ToString::to_string)),
            followee_shared_inbox: Set(shared_inbox(followee)),
            created_at: Set(Utc::now().into()),
        };

        self.following_repo
            .insert_superseding_request(model, &follower.id, &followee.id)
            .await
    }

    async fn delete_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        self.following_repo.delete_by_pair(follower_id, followee_id).await
    }

    async fn find_follow_request(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        self.follow_request_repo.find_by_pair(follower_id, followee_id).await
    }

    async fn insert_follow_request(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> AppResult<NewRequest> {
        let row = follow_request::Model {
            id: self.id_gen.generate(),
            follower_id: follower.id.clone(),
            followee_id: followee.id.clone(),
            request_id: request_id.map(ToString::to_string),
            follower_host: follower.host().map(ToString::to_string),
            follower_inbox: follower.inbox().map(ToString::to_string),
            follower_shared_inbox: shared_inbox(follower),
            followee_host: followee.host().map(ToString::to_string),
            followee_inbox: followee.inbox().map(ToString::to_string),
            followee_shared_inbox: shared_inbox(followee),
            created_at: Utc::now().into(),
        };

        let outcome = self
            .follow_request_repo
            .insert(
                row.clone().into_active_model().reset_all(),
                &follower.id,
                &followee.id,
            )
            .await?;
        Ok(match outcome {
            RequestInsert::Inserted => NewRequest::Created(row),
            RequestInsert::AlreadyPending => NewRequest::AlreadyPending,
            RequestInsert::AlreadyFollowing => NewRequest::AlreadyFollowing,
        })
    }

    async fn delete_follow_request(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.follow_request_repo.delete_by_pair(follower_id, followee_id).await
    }

    async fn pending_requests_for(&self, followee_id: &str) -> AppResult<Vec<follow_request::Model>> {
        self.follow_request_repo.find_by_followee(followee_id).await
    }

    async fn followee_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        self.following_repo.followee_ids(follower_id).await
    }

    async fn adjust_counts(&self, follower_id: &str, followee_id: &str, delta: i32) -> AppResult<()> {
        self.user_repo
            .adjust_follow_counts(follower_id, followee_id, delta)
            .await
    }

    async fn count_active_following(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_following_not_moved(user_id).await
    }

    async fn count_active_followers(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_followers_not_moved(user_id).await
    }

    async fn set_following_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.user_repo.set_following_count(user_id, count).await
    }

    async fn set_followers_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.user_repo.set_followers_count(user_id, count).await
    }
}

pub(crate) fn shared_inbox(actor: &Actor) -> Option<String> {
    match &actor.origin {
        ActorOrigin::Remote { shared_inbox, .. } => shared_inbox.clone(),
        ActorOrigin::Local => None,
    }
}
