//! Per-follower cache of followee ids.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use relgraph_common::AppResult;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::store::RelationshipStore;

struct Entry {
    ids: Arc<HashSet<String>>,
    loaded_at: Instant,
}

/// Followee-id sets keyed by follower id.
///
/// Entries are loaded lazily, expire after `ttl`, and are dropped whenever an
/// edge of that follower changes. At most `capacity` followers are held; a
/// full cache sheds expired entries first, then the oldest one.
pub struct FollowingsCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl FollowingsCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// Cached followee ids of `follower_id`, loading them on a miss.
    pub async fn get_or_load(
        &self,
        follower_id: &str,
        store: &dyn RelationshipStore,
    ) -> AppResult<Arc<HashSet<String>>> {
        if let Some(ids) = self.live(follower_id).await {
            return Ok(ids);
        }

        let ids: HashSet<String> = store.followee_ids(follower_id).await?.into_iter().collect();
        let ids = Arc::new(ids);

        if self.capacity == 0 {
            return Ok(ids);
        }

        let mut entries = self.entries.write().await;
        if !entries.contains_key(follower_id) && entries.len() >= self.capacity {
            self.evict(&mut entries);
        }
        entries.insert(
            follower_id.to_string(),
            Entry {
                ids: Arc::clone(&ids),
                loaded_at: Instant::now(),
            },
        );
        Ok(ids)
    }

    pub async fn invalidate(&self, follower_id: &str) {
        self.entries.write().await.remove(follower_id);
    }

    /// Whether a live entry is held for `follower_id`.
    pub async fn contains(&self, follower_id: &str) -> bool {
        self.live(follower_id).await.is_some()
    }

    async fn live(&self, follower_id: &str) -> Option<Arc<HashSet<String>>> {
        self.entries
            .read()
            .await
            .get(follower_id)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.ids))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn evict(&self, entries: &mut HashMap<String, Entry>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.loaded_at.elapsed() < self.ttl);

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.loaded_at)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                entries.remove(&id);
            }
        }

        debug!(evicted = before - entries.len(), "Followings cache full");
    }
}
