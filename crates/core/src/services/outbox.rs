//! Outbound task queue.
//!
//! Relationship operations enqueue their side effects here after the local
//! mutation. An [`OutboxWorker`] drains the queue and calls the delivery
//! gateway and sinks; failures are logged and dropped so they can never undo
//! local state.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::activity::ProtocolActivity;
use super::counter::{CounterSinkService, InstanceStat};
use super::delivery::DeliveryService;
use super::event_publisher::{
    EventSinkService, InternalEvent, NotificationKind, UserEventKind, WebhookKind,
};

/// A side effect waiting to be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundTask {
    Deliver {
        source_actor_id: String,
        activity: ProtocolActivity,
        inbox: String,
        high_priority: bool,
    },
    InternalEvent(InternalEvent),
    UserEvent {
        user_id: String,
        kind: UserEventKind,
        subject_id: String,
    },
    Notification {
        notifiee_id: String,
        kind: NotificationKind,
        notifier_id: String,
    },
    Webhook {
        user_id: String,
        kind: WebhookKind,
        subject_id: String,
    },
    FollowingChart {
        follower_id: String,
        followee_id: String,
        delta: i32,
    },
    InstanceStats {
        host: String,
        stat: InstanceStat,
        delta: i32,
    },
}

/// Default number of tasks buffered before producers wait for the worker.
pub const OUTBOX_BUFFER_SIZE: usize = 1000;

/// Receiving half of the outbox.
pub type OutboxReceiver = mpsc::Receiver<OutboundTask>;

/// Sending half of the outbox. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundTask>,
}

impl Outbox {
    /// Create an outbox holding up to [`OUTBOX_BUFFER_SIZE`] tasks.
    #[must_use]
    pub fn channel() -> (Self, OutboxReceiver) {
        Self::with_capacity(OUTBOX_BUFFER_SIZE)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a task, waiting while the buffer is full. Never fails the
    /// caller; a task sent after the worker has stopped is logged and
    /// dropped.
    pub async fn enqueue(&self, task: OutboundTask) {
        if let Err(e) = self.tx.send(task).await {
            warn!(task = ?e.0, "Outbox worker has stopped, dropping task");
        }
    }
}

/// Performs queued side effects.
pub struct OutboxWorker {
    rx: OutboxReceiver,
    delivery: DeliveryService,
    events: EventSinkService,
    counters: CounterSinkService,
}

impl OutboxWorker {
    #[must_use]
    pub fn new(
        rx: OutboxReceiver,
        delivery: DeliveryService,
        events: EventSinkService,
        counters: CounterSinkService,
    ) -> Self {
        Self {
            rx,
            delivery,
            events,
            counters,
        }
    }

    /// Run until every [`Outbox`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            self.process(task).await;
        }
        debug!("Outbox closed, worker exiting");
    }

    /// Run until `shutdown` resolves or every [`Outbox`] handle is dropped.
    ///
    /// On shutdown the queue is closed to new tasks and everything already
    /// buffered is performed before returning.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                task = self.rx.recv() => match task {
                    Some(task) => self.process(task).await,
                    None => {
                        debug!("Outbox closed, worker exiting");
                        return;
                    }
                },
                () = &mut shutdown => break,
            }
        }

        self.rx.close();
        let mut flushed = 0;
        while let Some(task) = self.rx.recv().await {
            self.process(task).await;
            flushed += 1;
        }
        info!(flushed, "Outbox drained on shutdown");
    }

    /// Perform everything queued so far, then return.
    pub async fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.process(task).await;
            processed += 1;
        }
        processed
    }

    async fn process(&self, task: OutboundTask) {
        let result = match &task {
            OutboundTask::Deliver {
                source_actor_id,
                activity,
                inbox,
                high_priority,
            } => {
                self.delivery
                    .deliver(source_actor_id, activity.clone(), inbox, *high_priority)
                    .await
            }
            OutboundTask::InternalEvent(event) => self.events.publish_internal_event(event).await,
            OutboundTask::UserEvent {
                user_id,
                kind,
                subject_id,
            } => self.events.publish_user_event(user_id, *kind, subject_id).await,
            OutboundTask::Notification {
                notifiee_id,
                kind,
                notifier_id,
            } => {
                self.events
                    .create_notification(notifiee_id, *kind, notifier_id)
                    .await
            }
            OutboundTask::Webhook {
                user_id,
                kind,
                subject_id,
            } => self.events.dispatch_webhooks(user_id, *kind, subject_id).await,
            OutboundTask::FollowingChart {
                follower_id,
                followee_id,
                delta,
            } => {
                self.counters
                    .update_following_chart(follower_id, followee_id, *delta)
                    .await
            }
            OutboundTask::InstanceStats { host, stat, delta } => {
                self.counters.update_instance_stats(host, *stat, *delta).await
            }
        };

        if let Err(e) = result {
            warn!(error = %e, task = ?task, "Outbound task failed");
        }
    }
}
