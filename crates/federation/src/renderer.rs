//! JSON-LD rendering of follow-protocol activities.

use relgraph_common::{AppError, AppResult, IdGenerator};
use relgraph_core::{FollowObject, ProtocolActivity};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::activities::{AcceptActivity, FollowActivity, RejectActivity, UndoActivity};

/// `ActivityStreams` JSON-LD context.
pub const ACTIVITY_STREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// A top-level activity document.
#[derive(Serialize)]
struct Document<'a, T> {
    #[serde(rename = "@context")]
    context: &'static str,
    #[serde(flatten)]
    activity: &'a T,
}

/// Renders [`ProtocolActivity`] values into deliverable JSON.
#[derive(Debug, Clone)]
pub struct ApRenderer {
    id_gen: IdGenerator,
}

impl Default for ApRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ApRenderer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            id_gen: IdGenerator::new(),
        }
    }

    /// Render `activity` as a JSON-LD document.
    ///
    /// Accept, Reject and Undo get a fresh id under their actor; the embedded
    /// Follow keeps the id it was sent with.
    pub fn render(&self, activity: &ProtocolActivity) -> AppResult<Value> {
        match activity {
            ProtocolActivity::Follow(follow) => document(&follow_activity(follow)?),
            ProtocolActivity::Accept { actor, object } => {
                let actor = parse_url(actor)?;
                let id = self.activity_id(&actor, "accept")?;
                document(&AcceptActivity::new(id, actor, follow_activity(object)?))
            }
            ProtocolActivity::Reject { actor, object } => {
                let actor = parse_url(actor)?;
                let id = self.activity_id(&actor, "reject")?;
                document(&RejectActivity::new(id, actor, follow_activity(object)?))
            }
            ProtocolActivity::Undo { actor, object } => {
                let actor = parse_url(actor)?;
                let id = self.activity_id(&actor, "undo")?;
                document(&UndoActivity::new(id, actor, follow_activity(object)?))
            }
        }
    }

    fn activity_id(&self, actor: &Url, kind: &str) -> AppResult<Url> {
        parse_url(&format!("{actor}/{kind}/{}", self.id_gen.generate_uuid_v4()))
    }
}

fn follow_activity(follow: &FollowObject) -> AppResult<FollowActivity> {
    Ok(FollowActivity::new(
        parse_url(&follow.id)?,
        parse_url(&follow.actor)?,
        parse_url(&follow.object)?,
    ))
}

fn document<T: Serialize>(activity: &T) -> AppResult<Value> {
    serde_json::to_value(Document {
        context: ACTIVITY_STREAMS_CONTEXT,
        activity,
    })
    .map_err(|e| AppError::Federation(format!("Failed to serialize activity: {e}")))
}

fn parse_url(value: &str) -> AppResult<Url> {
    Url::parse(value).map_err(|e| AppError::Federation(format!("Invalid URL {value}: {e}")))
}
