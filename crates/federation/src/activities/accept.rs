//! Accept activity.

use activitypub_federation::kinds::activity::AcceptType;
use serde::{Deserialize, Serialize};
use url::Url;

use super::FollowActivity;

/// `ActivityPub` Accept activity.
/// Sent by the followee to approve a Follow.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptActivity {
    #[serde(rename = "type")]
    pub kind: AcceptType,
    pub id: Url,
    pub actor: Url,
    pub object: FollowActivity,
}

impl AcceptActivity {
    #[must_use]
    pub const fn new(id: Url, actor: Url, object: FollowActivity) -> Self {
        Self {
            kind: AcceptType::Accept,
            id,
            actor,
            object,
        }
    }
}
