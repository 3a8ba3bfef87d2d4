//! Identity resolution.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use relgraph_common::{AppError, AppResult};
use relgraph_db::{
    entities::{user, user_profile},
    repositories::UserRepository,
};

use super::actor::{Actor, ActorOrigin, Locality};

/// Loads actor snapshots and walks migration history.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Load a fresh snapshot of an actor.
    async fn resolve(&self, actor_id: &str) -> AppResult<Actor>;

    /// Look an actor up by its `ActivityPub` id.
    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Actor>>;

    fn classify(&self, actor: &Actor) -> Locality {
        actor.locality()
    }

    /// Identities `actor` migrated away from, nearest first.
    ///
    /// An entry of `also_known_as` counts only if that account points back
    /// at its successor through `moved_to_uri`. The walk stops after
    /// `max_depth` generations.
    async fn resolve_moved_ancestors(&self, actor: &Actor, max_depth: usize) -> AppResult<Vec<Actor>> {
        let mut ancestors = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([actor.uri.clone()]);
        let mut frontier: VecDeque<(Actor, usize)> = VecDeque::from([(actor.clone(), 0)]);

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for uri in &current.also_known_as {
                if !seen.insert(uri.clone()) {
                    continue;
                }
                let Some(previous) = self.find_by_uri(uri).await? else {
                    continue;
                };
                if previous.moved_to_uri.as_deref() != Some(current.uri.as_str()) {
                    continue;
                }
                ancestors.push(previous.clone());
                frontier.push_back((previous, depth + 1));
            }
        }

        Ok(ancestors)
    }
}

/// Type alias for a shared identity resolver.
pub type IdentityResolverService = Arc<dyn IdentityResolver>;

/// Identity resolver reading the `user` and `user_profile` tables.
#[derive(Clone)]
pub struct DbIdentityResolver {
    user_repo: UserRepository,
    server_url: String,
}

impl DbIdentityResolver {
    #[must_use]
    pub fn new(user_repo: UserRepository, server_url: impl Into<String>) -> Self {
        Self {
            user_repo,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_actor(&self, user: user::Model, profile: Option<user_profile::Model>) -> AppResult<Actor> {
        let also_known_as = user.aliases();
        let uri = user
            .uri
            .clone()
            .unwrap_or_else(|| format!("{}/users/{}", self.server_url, user.id));

        let origin = match user.host {
            None => ActorOrigin::Local,
            Some(host) => ActorOrigin::Remote {
                inbox: user.inbox.ok_or_else(|| {
                    AppError::Federation(format!("Remote actor {} has no inbox", user.id))
                })?,
                host,
                shared_inbox: user.shared_inbox,
            },
        };

        let (careful_bot, auto_accept_followed) = profile
            .map_or((false, false), |p| (p.careful_bot, p.auto_accept_followed));

        Ok(Actor {
            id: user.id,
            username: user.username,
            uri,
            origin,
            owner_id: None,
            moved_to_uri: user.moved_to_uri,
            also_known_as,
            is_locked: user.is_locked,
            is_bot: user.is_bot,
            careful_bot,
            auto_accept_followed,
            followers_count: user.followers_count,
            following_count: user.following_count,
        })
    }
}

#[async_trait]
impl IdentityResolver for DbIdentityResolver {
    async fn resolve(&self, actor_id: &str) -> AppResult<Actor> {
        let (user, profile) = self
            .user_repo
            .find_with_profile(actor_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(actor_id.to_string()))?;
        self.to_actor(user, profile)
    }

    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Actor>> {
        if let Some(id) = uri
            .strip_prefix(&self.server_url)
            .and_then(|path| path.strip_prefix("/users/"))
        {
            return match self.user_repo.find_with_profile(id).await? {
                Some((user, profile)) => self.to_actor(user, profile).map(Some),
                None => Ok(None),
            };
        }

        match self.user_repo.find_by_uri_with_profile(uri).await? {
            Some((user, profile)) => self.to_actor(user, profile).map(Some),
            None => Ok(None),
        }
    }
}
