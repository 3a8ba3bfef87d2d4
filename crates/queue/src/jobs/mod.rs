//! Job definitions.

#![allow(missing_docs)]

mod deliver;

pub use deliver::{DEFAULT_QUEUE, DeliverJob, HIGH_PRIORITY_QUEUE};
