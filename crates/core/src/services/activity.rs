//! Follow protocol activities, independent of their wire format.

use super::actor::Actor;

/// A Follow, either sent on its own or embedded as the object of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowObject {
    pub id: String,
    /// URI of the follower.
    pub actor: String,
    /// URI of the followee.
    pub object: String,
}

/// An outbound follow-protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolActivity {
    Follow(FollowObject),
    Accept { actor: String, object: FollowObject },
    Reject { actor: String, object: FollowObject },
    Undo { actor: String, object: FollowObject },
}

impl ProtocolActivity {
    /// Activity type name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Follow(_) => "Follow",
            Self::Accept { .. } => "Accept",
            Self::Reject { .. } => "Reject",
            Self::Undo { .. } => "Undo",
        }
    }

    /// The Follow this activity is, or refers to.
    #[must_use]
    pub const fn follow(&self) -> &FollowObject {
        match self {
            Self::Follow(follow)
            | Self::Accept { object: follow, .. }
            | Self::Reject { object: follow, .. }
            | Self::Undo { object: follow, .. } => follow,
        }
    }
}

/// Builds protocol activities with ids minted under this server's URL.
#[derive(Debug, Clone)]
pub struct ActivityFactory {
    server_url: String,
}

impl ActivityFactory {
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Default id of a Follow that carries no correlation token.
    #[must_use]
    pub fn follow_id(&self, follower: &Actor, followee: &Actor) -> String {
        format!("{}/follows/{}/{}", self.server_url, follower.id, followee.id)
    }

    /// Id of a Follow sent on behalf of a stored follow request.
    #[must_use]
    pub fn request_follow_id(&self, request_row_id: &str) -> String {
        format!("{}/follows/{}", self.server_url, request_row_id)
    }

    #[must_use]
    pub fn follow_object(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> FollowObject {
        FollowObject {
            id: request_id.map_or_else(|| self.follow_id(follower, followee), ToString::to_string),
            actor: follower.uri.clone(),
            object: followee.uri.clone(),
        }
    }

    #[must_use]
    pub fn follow(&self, follower: &Actor, followee: &Actor, request_id: Option<&str>) -> ProtocolActivity {
        ProtocolActivity::Follow(self.follow_object(follower, followee, request_id))
    }

    /// Accept sent by the followee.
    #[must_use]
    pub fn accept(&self, follower: &Actor, followee: &Actor, request_id: Option<&str>) -> ProtocolActivity {
        ProtocolActivity::Accept {
            actor: followee.uri.clone(),
            object: self.follow_object(follower, followee, request_id),
        }
    }

    /// Reject sent by the followee.
    #[must_use]
    pub fn reject(&self, follower: &Actor, followee: &Actor, request_id: Option<&str>) -> ProtocolActivity {
        ProtocolActivity::Reject {
            actor: followee.uri.clone(),
            object: self.follow_object(follower, followee, request_id),
        }
    }

    /// Undo sent by the follower.
    #[must_use]
    pub fn undo(&self, follower: &Actor, followee: &Actor, request_id: Option<&str>) -> ProtocolActivity {
        ProtocolActivity::Undo {
            actor: follower.uri.clone(),
            object: self.follow_object(follower, followee, request_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Actor, Actor) {
        let follower = Actor::local("u1", "alice", "https://local.example/users/u1");
        let followee = Actor::remote(
            "r1",
            "carol",
            "https://remote.example/users/carol",
            "remote.example",
            "https://remote.example/users/carol/inbox",
        );
        (follower, followee)
    }

    #[test]
    fn test_follow_id_defaults_to_pair_path() {
        let factory = ActivityFactory::new("https://local.example/");
        let (follower, followee) = pair();

        let follow = factory.follow(&follower, &followee, None);
        assert_eq!(follow.follow().id, "https://local.example/follows/u1/r1");
        assert_eq!(follow.kind(), "Follow");
    }

    #[test]
    fn test_reply_echoes_correlation_token() {
        let factory = ActivityFactory::new("https://local.example");
        let (followee, follower) = pair();

        let reject = factory.reject(&follower, &followee, Some("https://remote.example/f/9"));
        match reject {
            ProtocolActivity::Reject { actor, object } => {
                assert_eq!(actor, followee.uri);
                assert_eq!(object.id, "https://remote.example/f/9");
                assert_eq!(object.actor, follower.uri);
                assert_eq!(object.object, followee.uri);
            }
            other => panic!("unexpected activity {other:?}"),
        }
    }
}
