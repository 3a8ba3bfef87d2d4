//! Event sink.
//!
//! Side effects of relationship changes that other subsystems care about:
//! internal events, per-user stream events, notifications and webhooks.
//! The queue crate provides the Redis pub/sub implementation.

use async_trait::async_trait;
use relgraph_common::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cross-process event about the follow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InternalEvent {
    #[serde(rename_all = "camelCase")]
    Follow {
        follower_id: String,
        followee_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Unfollow {
        follower_id: String,
        followee_id: String,
    },
}

/// Stream event delivered to one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserEventKind {
    /// The user followed someone.
    Follow,
    /// Someone followed the user.
    Followed,
    /// The user stopped following someone, or was rejected.
    Unfollow,
    ReceiveFollowRequest,
    /// Pending-request counters of the user changed.
    MeUpdated,
}

/// Notification stored for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Follow,
    ReceiveFollowRequest,
    FollowRequestAccepted,
}

/// Webhook trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WebhookKind {
    Follow,
    Followed,
    Unfollow,
}

/// Trait for publishing relationship side effects.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_internal_event(&self, event: &InternalEvent) -> AppResult<()>;

    /// Publish `kind` to `user_id`'s stream. `subject_id` is the other party.
    async fn publish_user_event(
        &self,
        user_id: &str,
        kind: UserEventKind,
        subject_id: &str,
    ) -> AppResult<()>;

    async fn create_notification(
        &self,
        notifiee_id: &str,
        kind: NotificationKind,
        notifier_id: &str,
    ) -> AppResult<()>;

    async fn dispatch_webhooks(
        &self,
        user_id: &str,
        kind: WebhookKind,
        subject_id: &str,
    ) -> AppResult<()>;
}

/// Type alias for a shared event sink.
pub type EventSinkService = Arc<dyn EventSink>;

/// Event sink that discards everything.
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn publish_internal_event(&self, _event: &InternalEvent) -> AppResult<()> {
        Ok(())
    }

    async fn publish_user_event(
        &self,
        _user_id: &str,
        _kind: UserEventKind,
        _subject_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn create_notification(
        &self,
        _notifiee_id: &str,
        _kind: NotificationKind,
        _notifier_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn dispatch_webhooks(
        &self,
        _user_id: &str,
        _kind: WebhookKind,
        _subject_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_event_wire_shape() {
        let event = InternalEvent::Follow {
            follower_id: "a".to_string(),
            followee_id: "b".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "follow", "followerId": "a", "followeeId": "b"})
        );
    }

    #[test]
    fn test_kind_names_match_stream_channels() {
        assert_eq!(
            serde_json::to_value(UserEventKind::ReceiveFollowRequest).unwrap(),
            "receiveFollowRequest"
        );
        assert_eq!(
            serde_json::to_value(NotificationKind::FollowRequestAccepted).unwrap(),
            "followRequestAccepted"
        );
        assert_eq!(serde_json::to_value(UserEventKind::MeUpdated).unwrap(), "meUpdated");
    }
}
