//! Undo activity.

use activitypub_federation::kinds::activity::UndoType;
use serde::{Deserialize, Serialize};
use url::Url;

use super::FollowActivity;

/// `ActivityPub` Undo activity.
/// Sent by the follower to withdraw a Follow.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoActivity {
    #[serde(rename = "type")]
    pub kind: UndoType,
    pub id: Url,
    pub actor: Url,
    pub object: FollowActivity,
}

impl UndoActivity {
    #[must_use]
    pub const fn new(id: Url, actor: Url, object: FollowActivity) -> Self {
        Self {
            kind: UndoType::Undo,
            id,
            actor,
            object,
        }
    }
}
