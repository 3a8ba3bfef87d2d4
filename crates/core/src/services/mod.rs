//! Relationship services.

#![allow(missing_docs)]

pub mod activity;
pub mod actor;
pub mod blocking;
pub mod cache;
pub mod counter;
pub mod delivery;
pub mod event_publisher;
pub mod following;
pub mod identity;
pub mod memory;
pub mod outbox;
pub mod store;

pub use activity::{ActivityFactory, FollowObject, ProtocolActivity};
pub use actor::{Actor, ActorOrigin, Locality};
pub use blocking::{BlockingOracle, BlockingOracleService, BlockingService};
pub use cache::FollowingsCache;
pub use counter::{
    CounterReconciler, CounterSink, CounterSinkService, InstanceStat, InstanceStatsSink,
    NoOpCounterSink,
};
pub use delivery::{ActivityDelivery, DeliveryService, NoOpDelivery};
pub use event_publisher::{
    EventSink, EventSinkService, InternalEvent, NoOpEventSink, NotificationKind, UserEventKind,
    WebhookKind,
};
pub use following::{
    AcceptAllReport, FollowOutcome, FollowingDeps, FollowingService, FollowingSettings,
};
pub use identity::{DbIdentityResolver, IdentityResolver, IdentityResolverService};
pub use memory::MemoryBackend;
pub use outbox::{OUTBOX_BUFFER_SIZE, OutboundTask, Outbox, OutboxReceiver, OutboxWorker};
pub use store::{DbRelationshipStore, NewRequest, RelationshipStore, RelationshipStoreService};
