//! Shared harness for following scenarios.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relgraph_common::AppResult;
use relgraph_core::{
    ActivityDelivery, Actor, EventSink, FollowingDeps, FollowingService, FollowingSettings,
    InternalEvent, MemoryBackend, NotificationKind, Outbox, OutboxWorker, ProtocolActivity,
    RelationshipStoreService, UserEventKind, WebhookKind,
};

pub const SERVER_URL: &str = "https://local.example";

/// A delivered activity as seen by the gateway.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub source_actor_id: String,
    pub activity: ProtocolActivity,
    pub inbox: String,
    pub high_priority: bool,
}

/// Records everything the outbox worker hands to the gateway and sinks.
#[derive(Default)]
pub struct Recorder {
    pub deliveries: Mutex<Vec<Delivered>>,
    pub internal_events: Mutex<Vec<InternalEvent>>,
    pub user_events: Mutex<Vec<(String, UserEventKind, String)>>,
    pub notifications: Mutex<Vec<(String, NotificationKind, String)>>,
    pub webhooks: Mutex<Vec<(String, WebhookKind, String)>>,
}

#[async_trait]
impl ActivityDelivery for Recorder {
    async fn deliver(
        &self,
        source_actor_id: &str,
        activity: ProtocolActivity,
        inbox: &str,
        high_priority: bool,
    ) -> AppResult<()> {
        self.deliveries.lock().unwrap().push(Delivered {
            source_actor_id: source_actor_id.to_string(),
            activity,
            inbox: inbox.to_string(),
            high_priority,
        });
        Ok(())
    }
}

#[async_trait]
impl EventSink for Recorder {
    async fn publish_internal_event(&self, event: &InternalEvent) -> AppResult<()> {
        self.internal_events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_user_event(
        &self,
        user_id: &str,
        kind: UserEventKind,
        subject_id: &str,
    ) -> AppResult<()> {
        self.user_events
            .lock()
            .unwrap()
            .push((user_id.to_string(), kind, subject_id.to_string()));
        Ok(())
    }

    async fn create_notification(
        &self,
        notifiee_id: &str,
        kind: NotificationKind,
        notifier_id: &str,
    ) -> AppResult<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((notifiee_id.to_string(), kind, notifier_id.to_string()));
        Ok(())
    }

    async fn dispatch_webhooks(
        &self,
        user_id: &str,
        kind: WebhookKind,
        subject_id: &str,
    ) -> AppResult<()> {
        self.webhooks
            .lock()
            .unwrap()
            .push((user_id.to_string(), kind, subject_id.to_string()));
        Ok(())
    }
}

impl Recorder {
    pub fn deliveries(&self) -> Vec<Delivered> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn delivered_kinds(&self) -> Vec<&'static str> {
        self.deliveries().iter().map(|d| d.activity.kind()).collect()
    }

    pub fn user_events(&self) -> Vec<(String, UserEventKind, String)> {
        self.user_events.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(String, NotificationKind, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn webhooks(&self) -> Vec<(String, WebhookKind, String)> {
        self.webhooks.lock().unwrap().clone()
    }

    pub fn internal_events(&self) -> Vec<InternalEvent> {
        self.internal_events.lock().unwrap().clone()
    }
}

/// A service wired to an in-memory backend and a recording worker.
pub struct Harness {
    pub service: FollowingService,
    pub backend: Arc<MemoryBackend>,
    pub recorder: Arc<Recorder>,
    worker: OutboxWorker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: FollowingSettings) -> Self {
        Self::build(settings, |backend| backend as RelationshipStoreService)
    }

    /// A harness whose service writes through `wrap(backend)`.
    pub fn with_store(
        wrap: impl FnOnce(Arc<MemoryBackend>) -> RelationshipStoreService,
    ) -> Self {
        Self::build(settings(), wrap)
    }

    fn build(
        settings: FollowingSettings,
        wrap: impl FnOnce(Arc<MemoryBackend>) -> RelationshipStoreService,
    ) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let recorder = Arc::new(Recorder::default());
        let (outbox, rx) = Outbox::channel();

        let service = FollowingService::new(FollowingDeps {
            store: wrap(backend.clone()),
            blocking: backend.clone(),
            identity: backend.clone(),
            outbox,
            settings,
        });
        let worker = OutboxWorker::new(rx, recorder.clone(), recorder.clone(), backend.clone());

        Self {
            service,
            backend,
            recorder,
            worker,
        }
    }

    /// Run every queued side effect.
    pub async fn flush(&mut self) -> usize {
        self.worker.drain().await
    }

    pub async fn add(&self, actor: Actor) -> Actor {
        self.backend.insert_actor(actor.clone()).await;
        actor
    }

    pub async fn counts(&self, id: &str) -> (i32, i32) {
        let actor = self.backend.actor(id).await.unwrap();
        (actor.following_count, actor.followers_count)
    }
}

pub fn settings() -> FollowingSettings {
    FollowingSettings {
        server_url: SERVER_URL.to_string(),
        federation_enabled: true,
        max_alias_depth: 10,
        cache_ttl: Duration::from_secs(300),
        cache_capacity: 1_000,
        enable_federated_instance_stats: true,
    }
}

pub fn local(id: &str) -> Actor {
    Actor::local(id, id, format!("{SERVER_URL}/users/{id}"))
}

pub fn remote(id: &str, host: &str) -> Actor {
    Actor::remote(
        id,
        id,
        format!("https://{host}/users/{id}"),
        host,
        format!("https://{host}/users/{id}/inbox"),
    )
}
