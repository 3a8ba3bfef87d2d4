//! Background delivery and event distribution for relgraph.
//!
//! - **Jobs**: `ActivityPub` delivery jobs on two apalis queues
//! - **Workers**: the HTTP deliver worker
//! - **Delivery**: [`RedisDeliveryService`], the core's delivery gateway
//! - **Pub/Sub**: [`RedisEventSink`] and cross-process internal events

pub mod delivery_impl;
pub mod jobs;
pub mod pubsub;
pub mod workers;

pub use delivery_impl::RedisDeliveryService;
pub use jobs::*;
pub use pubsub::{Channels, PubSubEvent, RedisEventSink, RedisPubSub};
pub use workers::*;
