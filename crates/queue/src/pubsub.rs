//! Redis Pub/Sub for relationship events.
//!
//! Publishes stream events, notifications and webhook triggers for the
//! services that render them, and fans internal follow graph events out to
//! every relgraph process so per-process caches stay coherent.

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::{Error as RedisError, ErrorKind as RedisErrorKind};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use relgraph_common::{AppError, AppResult};
use relgraph_core::{EventSink, InternalEvent, NotificationKind, UserEventKind, WebhookKind};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pub/Sub channel names under a key prefix.
#[derive(Debug, Clone)]
pub struct Channels {
    prefix: String,
}

impl Channels {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Follow graph events shared between relgraph processes.
    #[must_use]
    pub fn internal(&self) -> String {
        format!("{}:internal", self.prefix)
    }

    /// Stream events of one user.
    #[must_use]
    pub fn user(&self, user_id: &str) -> String {
        format!("{}:user:{user_id}", self.prefix)
    }

    #[must_use]
    pub fn notifications(&self) -> String {
        format!("{}:notifications", self.prefix)
    }

    #[must_use]
    pub fn webhooks(&self) -> String {
        format!("{}:webhooks", self.prefix)
    }
}

/// Messages published for external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PubSubEvent {
    #[serde(rename_all = "camelCase")]
    UserEvent {
        user_id: String,
        kind: UserEventKind,
        subject_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Notification {
        notifiee_id: String,
        kind: NotificationKind,
        notifier_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Webhook {
        user_id: String,
        kind: WebhookKind,
        subject_id: String,
    },
}

/// Redis Pub/Sub manager.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    channels: Channels,
    /// Internal events received from Redis.
    internal_tx: broadcast::Sender<InternalEvent>,
}

impl RedisPubSub {
    /// Connect the publishing and subscribing clients.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        let (internal_tx, _) = broadcast::channel(1000);

        info!(prefix = %prefix, "Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            channels: Channels::new(prefix),
            internal_tx,
        })
    }

    #[must_use]
    pub const fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Subscribe to the internal channel and start forwarding its events.
    pub async fn start(&self) -> Result<(), RedisError> {
        let channel = self.channels.internal();
        self.subscriber.subscribe(channel.as_str()).await?;
        info!(channel = %channel, "Subscribed to internal events");

        let internal_tx = self.internal_tx.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let Some(payload) = message.value.as_string() else {
                    continue;
                };
                match serde_json::from_str::<InternalEvent>(&payload) {
                    Ok(event) => {
                        debug!(?event, "Received internal event");
                        // Having no receivers is fine.
                        let _ = internal_tx.send(event);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse internal event");
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Receiver of internal events published by any process.
    #[must_use]
    pub fn subscribe_internal(&self) -> broadcast::Receiver<InternalEvent> {
        self.internal_tx.subscribe()
    }

    /// Publish a serializable payload to a channel.
    pub async fn publish<T: Serialize + Sync>(
        &self,
        channel: &str,
        payload: &T,
    ) -> Result<(), RedisError> {
        let payload = serde_json::to_string(payload).map_err(|e| {
            RedisError::new(
                RedisErrorKind::InvalidArgument,
                format!("Serialization error: {e}"),
            )
        })?;
        let _: () = self.publisher.publish(channel, payload).await?;
        debug!(channel, "Published Pub/Sub message");
        Ok(())
    }

    /// Close both clients.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

/// [`EventSink`] publishing over Redis Pub/Sub.
#[derive(Clone)]
pub struct RedisEventSink {
    pubsub: Arc<RedisPubSub>,
}

impl RedisEventSink {
    #[must_use]
    pub const fn new(pubsub: Arc<RedisPubSub>) -> Self {
        Self { pubsub }
    }

    async fn send<T: Serialize + Sync>(&self, channel: &str, payload: &T) -> AppResult<()> {
        self.pubsub
            .publish(channel, payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

#[async_trait]
impl EventSink for RedisEventSink {
    async fn publish_internal_event(&self, event: &InternalEvent) -> AppResult<()> {
        self.send(&self.pubsub.channels().internal(), event).await
    }

    async fn publish_user_event(
        &self,
        user_id: &str,
        kind: UserEventKind,
        subject_id: &str,
    ) -> AppResult<()> {
        let event = PubSubEvent::UserEvent {
            user_id: user_id.to_string(),
            kind,
            subject_id: subject_id.to_string(),
        };
        self.send(&self.pubsub.channels().user(user_id), &event).await
    }

    async fn create_notification(
        &self,
        notifiee_id: &str,
        kind: NotificationKind,
        notifier_id: &str,
    ) -> AppResult<()> {
        let event = PubSubEvent::Notification {
            notifiee_id: notifiee_id.to_string(),
            kind,
            notifier_id: notifier_id.to_string(),
        };
        self.send(&self.pubsub.channels().notifications(), &event).await
    }

    async fn dispatch_webhooks(
        &self,
        user_id: &str,
        kind: WebhookKind,
        subject_id: &str,
    ) -> AppResult<()> {
        let event = PubSubEvent::Webhook {
            user_id: user_id.to_string(),
            kind,
            subject_id: subject_id.to_string(),
        };
        self.send(&self.pubsub.channels().webhooks(), &event).await
    }
}
