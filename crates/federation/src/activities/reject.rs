//! Reject activity.

use activitypub_federation::kinds::activity::RejectType;
use serde::{Deserialize, Serialize};
use url::Url;

use super::FollowActivity;

/// `ActivityPub` Reject activity.
/// Sent by the followee to decline a Follow or drop an established follower.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectActivity {
    #[serde(rename = "type")]
    pub kind: RejectType,
    pub id: Url,
    pub actor: Url,
    pub object: FollowActivity,
}

impl RejectActivity {
    #[must_use]
    pub const fn new(id: Url, actor: Url, object: FollowActivity) -> Self {
        Self {
            kind: RejectType::Reject,
            id,
            actor,
            object,
        }
    }
}
