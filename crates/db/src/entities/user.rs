//! User entity (local and remote actors).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub username: String,

    pub username_lower: String,

    /// NULL = local user, Some(host) = remote user
    #[sea_orm(nullable)]
    pub host: Option<String>,

    /// `ActivityPub` URI (remote users)
    #[sea_orm(unique, nullable)]
    pub uri: Option<String>,

    /// `ActivityPub` inbox URL (remote users)
    #[sea_orm(nullable)]
    pub inbox: Option<String>,

    /// `ActivityPub` shared inbox URL (remote users)
    #[sea_orm(nullable)]
    pub shared_inbox: Option<String>,

    /// Is this account locked (requires follow approval)?
    #[sea_orm(default_value = false)]
    pub is_locked: bool,

    /// Is this user a bot?
    #[sea_orm(default_value = false)]
    pub is_bot: bool,

    /// URI of the account this user has moved to
    #[sea_orm(nullable)]
    pub moved_to_uri: Option<String>,

    /// Previous identities of this account (`alsoKnownAs`, JSON array of URIs)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub also_known_as: Option<Json>,

    /// Followers count (denormalized)
    #[sea_orm(default_value = 0)]
    pub followers_count: i32,

    /// Following count (denormalized)
    #[sea_orm(default_value = 0)]
    pub following_count: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_profile::Entity")]
    Profile,
}

impl Related<super::user_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this user's authoritative record lives on this server.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// Previous identity URIs stored in `also_known_as`.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        match &self.also_known_as {
            Some(Json::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect(),
            Some(Json::String(uri)) => vec![uri.clone()],
            _ => Vec::new(),
        }
    }
}
