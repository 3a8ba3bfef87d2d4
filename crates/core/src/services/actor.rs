//! Actor snapshots.
//!
//! An [`Actor`] is a point-in-time view of a user or channel, loaded fresh
//! for every relationship operation.

/// Where an actor's authoritative record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorOrigin {
    /// Hosted on this server.
    Local,
    /// Hosted on a federated peer.
    Remote {
        host: String,
        inbox: String,
        shared_inbox: Option<String>,
    },
}

/// Local/remote classification without the delivery details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Local,
    Remote,
}

/// A user or channel taking part in a follow relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub username: String,
    /// Canonical `ActivityPub` id.
    pub uri: String,
    pub origin: ActorOrigin,
    /// Owning user for owned actors such as channels.
    pub owner_id: Option<String>,
    /// Set once the actor has migrated to another identity.
    pub moved_to_uri: Option<String>,
    /// Identities this actor previously used (`alsoKnownAs`).
    pub also_known_as: Vec<String>,
    pub is_locked: bool,
    pub is_bot: bool,
    /// Require approval for follows from bots.
    pub careful_bot: bool,
    /// Auto-approve requests from actors this one already follows.
    pub auto_accept_followed: bool,
    pub followers_count: i32,
    pub following_count: i32,
}

impl Actor {
    /// A local actor with default settings.
    #[must_use]
    pub fn local(id: impl Into<String>, username: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::with_origin(id.into(), username.into(), uri.into(), ActorOrigin::Local)
    }

    /// A remote actor with default settings.
    #[must_use]
    pub fn remote(
        id: impl Into<String>,
        username: impl Into<String>,
        uri: impl Into<String>,
        host: impl Into<String>,
        inbox: impl Into<String>,
    ) -> Self {
        let origin = ActorOrigin::Remote {
            host: host.into(),
            inbox: inbox.into(),
            shared_inbox: None,
        };
        Self::with_origin(id.into(), username.into(), uri.into(), origin)
    }

    const fn with_origin(id: String, username: String, uri: String, origin: ActorOrigin) -> Self {
        Self {
            id,
            username,
            uri,
            origin,
            owner_id: None,
            moved_to_uri: None,
            also_known_as: Vec::new(),
            is_locked: false,
            is_bot: false,
            careful_bot: false,
            auto_accept_followed: false,
            followers_count: 0,
            following_count: 0,
        }
    }

    #[must_use]
    pub const fn locality(&self) -> Locality {
        match self.origin {
            ActorOrigin::Local => Locality::Local,
            ActorOrigin::Remote { .. } => Locality::Remote,
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.origin, ActorOrigin::Local)
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        !self.is_local()
    }

    /// Host of a remote actor.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match &self.origin {
            ActorOrigin::Local => None,
            ActorOrigin::Remote { host, .. } => Some(host),
        }
    }

    /// Personal inbox of a remote actor.
    #[must_use]
    pub fn inbox(&self) -> Option<&str> {
        match &self.origin {
            ActorOrigin::Local => None,
            ActorOrigin::Remote { inbox, .. } => Some(inbox),
        }
    }

    #[must_use]
    pub const fn has_moved(&self) -> bool {
        self.moved_to_uri.is_some()
    }

    /// Whether `target` is this actor itself or an actor it owns.
    #[must_use]
    pub fn is_self_or_owner_of(&self, target: &Self) -> bool {
        self.id == target.id || target.owner_id.as_deref() == Some(self.id.as_str())
    }
}
