//! Job workers.

mod deliver;

pub use deliver::{DeliverContext, DeliveryError, deliver_worker};
