//! In-process backend.
//!
//! [`MemoryBackend`] keeps actors, blocks, requests and edges in a single
//! mutex-guarded map set. It implements every storage-side collaborator of
//! [`FollowingService`](super::following::FollowingService), which makes it
//! the backend of choice for scenario tests and single-process tooling.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use relgraph_common::{AppError, AppResult, IdGenerator};
use relgraph_db::{
    entities::{follow_request, following},
    repositories::EdgeInsert,
};
use tokio::sync::Mutex;

use super::actor::Actor;
use super::blocking::BlockingOracle;
use super::counter::{CounterSink, InstanceStat};
use super::identity::IdentityResolver;
use super::store::{NewRequest, RelationshipStore, shared_inbox};

type Pair = (String, String);

#[derive(Default)]
struct State {
    actors: HashMap<String, Actor>,
    blocks: HashSet<Pair>,
    followings: BTreeMap<Pair, following::Model>,
    requests: BTreeMap<Pair, follow_request::Model>,
    instance_stats: HashMap<(String, InstanceStat), i64>,
    chart: Vec<(String, String, i32)>,
}

impl State {
    fn actor_mut(&mut self, user_id: &str) -> AppResult<&mut Actor> {
        self.actors
            .get_mut(user_id)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    fn has_moved(&self, user_id: &str) -> bool {
        self.actors.get(user_id).is_some_and(Actor::has_moved)
    }
}

/// Relationship state held in memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    id_gen: IdGenerator,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an actor.
    pub async fn insert_actor(&self, actor: Actor) {
        self.state.lock().await.actors.insert(actor.id.clone(), actor);
    }

    /// Record that `blocker_id` blocks `blockee_id`.
    pub async fn block(&self, blocker_id: &str, blockee_id: &str) {
        self.state
            .lock()
            .await
            .blocks
            .insert((blocker_id.to_string(), blockee_id.to_string()));
    }

    /// Current snapshot of an actor, counters included.
    pub async fn actor(&self, user_id: &str) -> Option<Actor> {
        self.state.lock().await.actors.get(user_id).cloned()
    }

    /// Mark an actor as migrated to `target_uri`.
    pub async fn set_moved(&self, user_id: &str, target_uri: &str) -> AppResult<()> {
        self.state.lock().await.actor_mut(user_id)?.moved_to_uri = Some(target_uri.to_string());
        Ok(())
    }

    pub async fn has_edge(&self, follower_id: &str, followee_id: &str) -> bool {
        self.state
            .lock()
            .await
            .followings
            .contains_key(&(follower_id.to_string(), followee_id.to_string()))
    }

    pub async fn has_request(&self, follower_id: &str, followee_id: &str) -> bool {
        self.state
            .lock()
            .await
            .requests
            .contains_key(&(follower_id.to_string(), followee_id.to_string()))
    }

    /// Number of stored edges.
    pub async fn edge_count(&self) -> usize {
        self.state.lock().await.followings.len()
    }

    /// All stored edges as `(follower_id, followee_id)` pairs.
    pub async fn edges(&self) -> Vec<(String, String)> {
        self.state.lock().await.followings.keys().cloned().collect()
    }

    /// All pending requests as `(follower_id, followee_id)` pairs.
    pub async fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().await.requests.keys().cloned().collect()
    }

    /// Accumulated per-host statistic.
    pub async fn instance_stat(&self, host: &str, stat: InstanceStat) -> i64 {
        self.state
            .lock()
            .await
            .instance_stats
            .get(&(host.to_string(), stat))
            .copied()
            .unwrap_or(0)
    }

    /// Chart updates received so far, in order.
    pub async fn chart_updates(&self) -> Vec<(String, String, i32)> {
        self.state.lock().await.chart.clone()
    }
}

#[async_trait]
impl BlockingOracle for MemoryBackend {
    async fn is_blocked(&self, blocker_id: &str, blockee_id: &str) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .blocks
            .contains(&(blocker_id.to_string(), blockee_id.to_string())))
    }

    async fn unblock(&self, blocker_id: &str, blockee_id: &str) -> AppResult<()> {
        self.state
            .lock()
            .await
            .blocks
            .remove(&(blocker_id.to_string(), blockee_id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for MemoryBackend {
    async fn resolve(&self, actor_id: &str) -> AppResult<Actor> {
        self.actor(actor_id)
            .await
            .ok_or_else(|| AppError::UserNotFound(actor_id.to_string()))
    }

    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Actor>> {
        Ok(self
            .state
            .lock()
            .await
            .actors
            .values()
            .find(|a| a.uri == uri)
            .cloned())
    }
}

#[async_trait]
impl RelationshipStore for MemoryBackend {
    async fn find_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Ok(self
            .state
            .lock()
            .await
            .followings
            .get(&(follower_id.to_string(), followee_id.to_string()))
            .cloned())
    }

    async fn insert_following(&self, follower: &Actor, followee: &Actor) -> AppResult<EdgeInsert> {
        let key = (follower.id.clone(), followee.id.clone());
        let mut state = self.state.lock().await;

        let superseded_request = state.requests.remove(&key);
        if state.followings.contains_key(&key) {
            return Ok(EdgeInsert {
                inserted: false,
                superseded_request,
            });
        }

        state.followings.insert(
            key,
            following::Model {
                id: self.id_gen.generate(),
                follower_id: follower.id.clone(),
                followee_id: followee.id.clone(),
                follower_host: follower.host().map(ToString::to_string),
                follower_inbox: follower.inbox().map(ToString::to_string),
                follower_shared_inbox: shared_inbox(follower),
                followee_host: followee.host().map(ToString::to_string),
                followee_inbox: followee.inbox().map(ToString::to_string),
                followee_shared_inbox: shared_inbox(followee),
                created_at: Utc::now().into(),
            },
        );

        Ok(EdgeInsert {
            inserted: true,
            superseded_request,
        })
    }

    async fn delete_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Ok(self
            .state
            .lock()
            .await
            .followings
            .remove(&(follower_id.to_string(), followee_id.to_string())))
    }

    async fn find_follow_request(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        Ok(self
            .state
            .lock()
            .await
            .requests
            .get(&(follower_id.to_string(), followee_id.to_string()))
            .cloned())
    }

    async fn insert_follow_request(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> AppResult<NewRequest> {
        let key = (follower.id.clone(), followee.id.clone());
        let mut state = self.state.lock().await;
        if state.followings.contains_key(&key) {
            return Ok(NewRequest::AlreadyFollowing);
        }
        if state.requests.contains_key(&key) {
            return Ok(NewRequest::AlreadyPending);
        }

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
        state.requests.insert(key, row.clone());
        Ok(NewRequest::Created(row))
    }

    async fn delete_follow_request(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .requests
            .remove(&(follower_id.to_string(), followee_id.to_string()))
            .is_some())
    }

    async fn pending_requests_for(&self, followee_id: &str) -> AppResult<Vec<follow_request::Model>> {
        let state = self.state.lock().await;
        let mut requests: Vec<_> = state
            .requests
            .values()
            .filter(|r| r.followee_id == followee_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(requests)
    }

    async fn followee_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .await
            .followings
            .keys()
            .filter(|(follower, _)| follower == follower_id)
            .map(|(_, followee)| followee.clone())
            .collect())
    }

    async fn adjust_counts(&self, follower_id: &str, followee_id: &str, delta: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let follower = state.actor_mut(follower_id)?;
        follower.following_count = (follower.following_count + delta).max(0);
        let followee = state.actor_mut(followee_id)?;
        followee.followers_count = (followee.followers_count + delta).max(0);
        Ok(())
    }

    async fn count_active_following(&self, user_id: &str) -> AppResult<u64> {
        let state = self.state.lock().await;
        let count = state
            .followings
            .keys()
            .filter(|(follower, followee)| follower == user_id && !state.has_moved(followee))
            .count();
        Ok(count as u64)
    }

    async fn count_active_followers(&self, user_id: &str) -> AppResult<u64> {
        let state = self.state.lock().await;
        let count = state
            .followings
            .keys()
            .filter(|(follower, followee)| followee == user_id && !state.has_moved(follower))
            .count();
        Ok(count as u64)
    }

    async fn set_following_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.state.lock().await.actor_mut(user_id)?.following_count = count;
        Ok(())
    }

    async fn set_followers_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.state.lock().await.actor_mut(user_id)?.followers_count = count;
        Ok(())
    }
}

#[async_trait]
impl CounterSink for MemoryBackend {
    async fn update_following_chart(
        &self,
        follower_id: &str,
        followee_id: &str,
        delta: i32,
    ) -> AppResult<()> {
        self.state
            .lock()
            .await
            .chart
            .push((follower_id.to_string(), followee_id.to_string(), delta));
        Ok(())
    }

    async fn update_instance_stats(
        &self,
        host: &str,
        stat: InstanceStat,
        delta: i32,
    ) -> AppResult<()> {
        *self
            .state
            .lock()
            .await
            .instance_stats
            .entry((host.to_string(), stat))
            .or_insert(0) += i64::from(delta);
        Ok(())
    }
}
