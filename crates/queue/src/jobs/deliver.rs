//! `ActivityPub` delivery job.

use serde::{Deserialize, Serialize};

/// Namespace of the queue for accepts and rejects.
pub const HIGH_PRIORITY_QUEUE: &str = "relgraph:deliver:high";

/// Namespace of the queue for everything else.
pub const DEFAULT_QUEUE: &str = "relgraph:deliver";

/// Job to deliver an activity to a remote inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverJob {
    /// The actor sending the activity.
    pub user_id: String,

    /// Target inbox URL.
    pub inbox: String,

    /// Rendered activity document.
    pub activity: serde_json::Value,

    /// Whether the job was queued on the high-priority queue.
    #[serde(default)]
    pub high_priority: bool,
}

impl DeliverJob {
    /// Create a new deliver job.
    #[must_use]
    pub const fn new(
        user_id: String,
        inbox: String,
        activity: serde_json::Value,
        high_priority: bool,
    ) -> Self {
        Self {
            user_id,
            inbox,
            activity,
            high_priority,
        }
    }
}
